use crate::models::LobbyPage;
use crate::relay::Relay;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::debug;

const MAX_PER_PAGE: usize = 100;

fn default_per_page() -> usize {
    MAX_PER_PAGE
}

#[derive(Debug, Deserialize)]
pub struct LobbyPageQuery {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

/// GET /api/lobbies - 公開中ロビー一覧（ページ単位）
pub async fn list_lobbies(
    relay: web::Data<Relay>,
    query: web::Query<LobbyPageQuery>,
) -> impl Responder {
    let per_page = query.per_page.clamp(1, MAX_PER_PAGE);
    let lobbies = relay.snapshot();
    let total = lobbies.len();
    debug!(page = query.page, per_page, total, "GET /api/lobbies");

    let lobbies = lobbies
        .into_iter()
        .skip(query.page.saturating_mul(per_page))
        .take(per_page)
        .collect();

    HttpResponse::Ok().json(LobbyPage {
        lobbies,
        page: query.page,
        per_page,
        total,
    })
}
