/// Query parameters for `GET /works`. All fields optional.
///
/// ```
/// use oracle_openalex::ListParams;
///
/// let params = ListParams::builder()
///     .filter("cites:W2741809807")
///     .per_page(50)
///     .build();
/// ```
#[derive(Debug, Default, Clone, bon::Builder)]
#[builder(on(String, into))]
pub struct ListParams {
    /// Filter expression, comma-separated AND conditions (e.g.
    /// `"cites:W123,publication_year:2020-2024"`).
    pub filter: Option<String>,

    /// Full-text search across title, abstract, and fulltext.
    pub search: Option<String>,

    /// Sort field with optional `:desc` suffix.
    pub sort: Option<String>,

    /// Results per page (1-200, default 25).
    pub per_page: Option<u32>,

    /// Page number for offset pagination (`page * per_page <= 10,000`).
    pub page: Option<u32>,

    /// Cursor for cursor pagination; `"*"` starts the first page.
    pub cursor: Option<String>,
}

impl ListParams {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per-page", per_page.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.clone()));
        }
        pairs
    }
}

/// Query parameters for `GET /works/{id}`.
#[derive(Debug, Default, Clone, bon::Builder)]
pub struct GetParams {
    /// Comma-separated field list to select (reduces payload size).
    pub select: Option<String>,
}

impl GetParams {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        match &self.select {
            Some(select) => vec![("select", select.clone())],
            None => Vec::new(),
        }
    }
}
