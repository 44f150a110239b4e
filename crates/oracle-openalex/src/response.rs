use serde::Deserialize;

/// Paginated list response returned by `GET /works`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    pub meta: ListMeta,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListMeta {
    pub count: i64,
    pub page: Option<i32>,
    pub per_page: Option<i32>,
    pub next_cursor: Option<String>,
}
