use oracle_store::UrlType;

/// Classifies a candidate URL into the closed set from §3/§4.2 using suffix,
/// host, and path heuristics. Every URL client runs its output through this
/// before persisting, so the classification rule lives in exactly one place.
pub fn classify_url(raw_url: &str) -> UrlType {
    let Ok(url) = url::Url::parse(raw_url) else {
        return UrlType::Unknown;
    };
    let host = url.host_str().unwrap_or_default();
    let path = url.path();
    let path_lower = path.to_ascii_lowercase();

    if path_lower.ends_with(".pdf") {
        return UrlType::PdfDirect;
    }

    if host.contains("ncbi.nlm.nih.gov") && path_lower.contains("/pmc/") && path_lower.contains("/pdf") {
        return UrlType::PdfDirect;
    }
    if host.contains("europepmc.org") && url.query_pairs().any(|(k, v)| k == "pdf" && v == "render") {
        return UrlType::PdfDirect;
    }

    if host.contains("doi.org") && !path_lower.ends_with(".pdf") {
        return UrlType::DoiResolver;
    }

    if host.contains("ncbi.nlm.nih.gov") && path_lower.contains("/pmc/") {
        if url.query_pairs().any(|(k, v)| k == "report" && v == "reader") {
            return UrlType::LandingPage;
        }
        return UrlType::HtmlFulltext;
    }
    if host.contains("europepmc.org") && path_lower.contains("/articles/") {
        return UrlType::LandingPage;
    }

    if path_lower.contains("/fulltext") || path_lower.contains("/full-text") {
        return UrlType::HtmlFulltext;
    }

    UrlType::LandingPage
}

/// Sort key implementing §4.4's `(priority asc, url_type rank)` ordering.
pub fn sort_key(priority: i64, url_type: &UrlType) -> (i64, u8) {
    (priority, url_type.rank())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bare_pdf_suffix() {
        assert_eq!(classify_url("https://example.org/paper.pdf"), UrlType::PdfDirect);
    }

    #[test]
    fn classifies_pmc_pdf_pattern() {
        assert_eq!(
            classify_url("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/pdf/"),
            UrlType::PdfDirect
        );
    }

    #[test]
    fn classifies_europepmc_render_pdf() {
        assert_eq!(
            classify_url("https://europepmc.org/articles/PMC123?pdf=render"),
            UrlType::PdfDirect
        );
    }

    #[test]
    fn classifies_pmc_reader_as_landing_page() {
        assert_eq!(
            classify_url("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC123/?report=reader"),
            UrlType::LandingPage
        );
    }

    #[test]
    fn classifies_doi_host_as_resolver() {
        assert_eq!(classify_url("https://doi.org/10.1186/s13059-023-02889-x"), UrlType::DoiResolver);
    }

    #[test]
    fn classifies_unparseable_as_unknown() {
        assert_eq!(classify_url("not a url"), UrlType::Unknown);
    }
}
