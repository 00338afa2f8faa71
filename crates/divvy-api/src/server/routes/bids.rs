#[derive(Debug, Deserialize)]
struct ProposeRequest {
    item_id: u64,
    participant_id: u64,
    price: Money,
}

#[derive(Debug, Serialize)]
struct StaleBidRef {
    item_id: u64,
    participant_id: u64,
}

#[derive(Debug, Serialize)]
struct ProposeResponse {
    schema_version: String,
    game_id: u64,
    status: GameStatus,
    prices: std::collections::BTreeMap<u64, Money>,
    bid: Bid,
    stale_bids: Vec<StaleBidRef>,
    resolved: bool,
}

async fn propose_price(
    Path(game): Path<String>,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProposeRequest>,
) -> Result<Json<ProposeResponse>, HttpApiError> {
    let now = now_ms();
    let mut inner = state.inner.lock().await;
    let outcome = inner.propose_price(
        &game,
        request.item_id,
        request.participant_id,
        request.price,
        now,
    )?;
    let snapshot = inner.view_game(&game, now)?.game();

    Ok(Json(ProposeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: snapshot.id,
        status: snapshot.status,
        prices: outcome.prices,
        bid: outcome.bid,
        stale_bids: outcome
            .stale_bids
            .into_iter()
            .map(|(item_id, participant_id)| StaleBidRef {
                item_id,
                participant_id,
            })
            .collect(),
        resolved: outcome.resolved,
    }))
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    item_id: u64,
    participant_id: u64,
}

#[derive(Debug, Serialize)]
struct ConfirmResponse {
    schema_version: String,
    game_id: u64,
    status: GameStatus,
    bid: Bid,
    resolved: bool,
}

async fn confirm_bid(
    Path(game): Path<String>,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, HttpApiError> {
    let now = now_ms();
    let mut inner = state.inner.lock().await;
    let outcome = inner.confirm_bid(&game, request.item_id, request.participant_id, now)?;
    let snapshot = inner.view_game(&game, now)?.game();

    Ok(Json(ConfirmResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: snapshot.id,
        status: snapshot.status,
        bid: outcome.bid,
        resolved: outcome.resolved,
    }))
}

#[derive(Debug, Deserialize)]
struct ResetRequest {
    participant_id: Option<u64>,
}

async fn reset_game(
    Path(game): Path<String>,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetRequest>,
) -> Result<Json<GameViewResponse>, HttpApiError> {
    let now = now_ms();
    let mut inner = state.inner.lock().await;
    inner.reset_game(&game, request.participant_id, now)?;
    Ok(Json(game_view(inner.view_game(&game, now)?)))
}

#[derive(Debug, Serialize)]
struct ListBidsResponse {
    schema_version: String,
    game_id: u64,
    bids: Vec<Bid>,
}

async fn list_bids(
    Path(game): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ListBidsResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let view = inner.view_game(&game, now_ms())?;
    Ok(Json(ListBidsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: view.game().id,
        bids: view.bids().cloned().collect(),
    }))
}
