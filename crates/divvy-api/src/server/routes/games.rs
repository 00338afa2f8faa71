#[derive(Debug, Deserialize)]
struct NewItemRequest {
    title: String,
    image_ref: Option<String>,
    price: Option<Money>,
}

#[derive(Debug, Deserialize)]
struct NewParticipantRequest {
    name: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateGameRequest {
    title: String,
    total_price: Money,
    #[serde(default)]
    items: Vec<NewItemRequest>,
    creator: Option<NewParticipantRequest>,
}

#[derive(Debug, Serialize)]
struct GameViewResponse {
    schema_version: String,
    game: Game,
    items: Vec<Item>,
    participants: Vec<Participant>,
    bids: Vec<Bid>,
    resolved: bool,
}

fn game_view(state: &GameState) -> GameViewResponse {
    GameViewResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game: state.game().clone(),
        items: state.items().cloned().collect(),
        participants: state.participants().cloned().collect(),
        bids: state.bids().cloned().collect(),
        resolved: state.is_resolved_now(),
    }
}

async fn create_game(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateGameRequest>,
) -> Result<Json<GameViewResponse>, HttpApiError> {
    if request.title.trim().is_empty() {
        return Err(HttpApiError::invalid_request("title must not be empty", None));
    }

    // Item prices are optional; when any is given, all must be given and they
    // must add up to the stated total. Otherwise the total is split evenly.
    let priced = request.items.iter().filter(|item| item.price.is_some()).count();
    if priced != 0 && priced != request.items.len() {
        return Err(HttpApiError::invalid_request(
            "either give a price for every item or for none",
            None,
        ));
    }
    if request
        .items
        .iter()
        .any(|item| item.price.is_some_and(|price| price.is_negative()))
    {
        return Err(HttpApiError::invalid_request(
            "item prices must not be negative",
            None,
        ));
    }
    let prices: Vec<Money> = if priced == 0 {
        request.total_price.split_even(request.items.len())
    } else {
        let given: Vec<Money> = request.items.iter().filter_map(|item| item.price).collect();
        let sum: Money = given.iter().copied().sum();
        if !sum.approx_eq(request.total_price) {
            return Err(HttpApiError::invalid_request(
                "item prices must add up to total_price",
                Some(format!("total_price={} sum={sum}", request.total_price)),
            ));
        }
        given
    };

    let now = now_ms();
    let mut inner = state.inner.lock().await;
    let game_id = inner.create_game(request.title, request.total_price, now)?;
    let key = game_id.to_string();

    for (item, price) in request.items.into_iter().zip(prices) {
        inner.add_item(&key, item.title, item.image_ref, price, now)?;
    }
    if let Some(creator) = request.creator {
        inner.join_game(&key, creator.name, creator.email, true, now)?;
    }

    Ok(Json(game_view(inner.view_game(&key, now)?)))
}

#[derive(Debug, Serialize)]
struct GameSummary {
    game_id: u64,
    unique_id: String,
    title: String,
    status: GameStatus,
    total_price: Money,
    item_count: usize,
    participant_count: usize,
    resolved_at_ms: Option<i64>,
    expires_at_ms: i64,
}

#[derive(Debug, Serialize)]
struct ListGamesResponse {
    schema_version: String,
    games: Vec<GameSummary>,
}

async fn list_games(State(state): State<AppState>) -> Json<ListGamesResponse> {
    let mut inner = state.inner.lock().await;
    inner.expire_due(now_ms());
    let games = inner
        .games()
        .map(|game_state| {
            let game = game_state.game();
            GameSummary {
                game_id: game.id,
                unique_id: game.unique_id.clone(),
                title: game.title.clone(),
                status: game.status,
                total_price: game.total_price,
                item_count: game_state.items().count(),
                participant_count: game_state.participants().count(),
                resolved_at_ms: game.resolved_at_ms,
                expires_at_ms: game.expires_at_ms,
            }
        })
        .collect();

    Json(ListGamesResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        games,
    })
}

async fn get_game(
    Path(game): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GameViewResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    Ok(Json(game_view(inner.view_game(&game, now_ms())?)))
}

#[derive(Debug, Serialize)]
struct ItemResponse {
    schema_version: String,
    item: Item,
}

async fn add_item(
    Path(game): Path<String>,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewItemRequest>,
) -> Result<Json<ItemResponse>, HttpApiError> {
    let price = request.price.ok_or_else(|| {
        HttpApiError::invalid_request("price is required when adding a single item", None)
    })?;

    let mut inner = state.inner.lock().await;
    let item = inner.add_item(&game, request.title, request.image_ref, price, now_ms())?;
    Ok(Json(ItemResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        item,
    }))
}

#[derive(Debug, Serialize)]
struct ListItemsResponse {
    schema_version: String,
    items: Vec<Item>,
}

async fn list_items(
    Path(game): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ListItemsResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let view = inner.view_game(&game, now_ms())?;
    Ok(Json(ListItemsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        items: view.items().cloned().collect(),
    }))
}

#[derive(Debug, Serialize)]
struct ParticipantResponse {
    schema_version: String,
    participant: Participant,
}

async fn join_game(
    Path(game): Path<String>,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewParticipantRequest>,
) -> Result<Json<ParticipantResponse>, HttpApiError> {
    if request.name.trim().is_empty() {
        return Err(HttpApiError::invalid_request("name must not be empty", None));
    }

    let mut inner = state.inner.lock().await;
    let participant = inner.join_game(&game, request.name, request.email, false, now_ms())?;
    Ok(Json(ParticipantResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        participant,
    }))
}

#[derive(Debug, Serialize)]
struct ListParticipantsResponse {
    schema_version: String,
    participants: Vec<Participant>,
}

async fn list_participants(
    Path(game): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ListParticipantsResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let view = inner.view_game(&game, now_ms())?;
    Ok(Json(ListParticipantsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        participants: view.participants().cloned().collect(),
    }))
}

#[derive(Debug, Serialize)]
struct ListEventsResponse {
    schema_version: String,
    game_id: u64,
    events: Vec<GameEvent>,
}

async fn list_events(
    Path(game): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ListEventsResponse>, HttpApiError> {
    let now = now_ms();
    let mut inner = state.inner.lock().await;
    let game_id = inner.view_game(&game, now)?.game().id;
    let events = inner.events_for(&game, now)?;
    Ok(Json(ListEventsResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id,
        events,
    }))
}

#[derive(Debug, Serialize)]
struct ResolutionResponse {
    schema_version: String,
    game_id: u64,
    status: GameStatus,
    resolved: bool,
    resolved_at_ms: Option<i64>,
}

async fn get_resolution(
    Path(game): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ResolutionResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let view = inner.view_game(&game, now_ms())?;
    Ok(Json(ResolutionResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        game_id: view.game().id,
        status: view.game().status,
        resolved: view.is_resolved_now(),
        resolved_at_ms: view.game().resolved_at_ms,
    }))
}
