use crate::classify::classify_url;
use crate::types::UrlCandidate;

/// One configured institutional repository, e.g. a university's DSpace
/// instance. §6 lets operators list these as `INSTITUTIONAL_REPOS`
/// (comma-separated `name=url_template` pairs); there's no common search API
/// across DSpace/EPrints/Fedora installs; we only trust operator-supplied
/// DOI-keyed URL templates rather than guessing at CMS conventions.
#[derive(Debug, Clone)]
pub struct InstitutionalRepo {
    pub name: String,
    /// Must contain a `{doi}` placeholder.
    pub url_template: String,
}

/// Generates candidate URLs from a small set of operator-configured
/// institutional repositories. No network calls; P3 verifies candidates by
/// attempting the download like any other source.
pub struct InstitutionalClient {
    repos: Vec<InstitutionalRepo>,
}

impl InstitutionalClient {
    pub fn new(repos: Vec<InstitutionalRepo>) -> Self {
        Self { repos }
    }

    pub fn candidates(&self, doi: &str) -> Vec<UrlCandidate> {
        self.repos
            .iter()
            .enumerate()
            .map(|(i, repo)| {
                let url = repo.url_template.replace("{doi}", doi);
                UrlCandidate {
                    source: format!("institutional:{}", repo.name),
                    url_type: classify_url(&url),
                    url,
                    priority: i as i64,
                    evidence: Some(format!("configured institutional repo {}", repo.name)),
                }
            })
            .collect()
    }
}

/// Parses §6's `INSTITUTIONAL_REPOS` format: `name1=template1,name2=template2`.
pub fn parse_repo_list(spec: &str) -> Vec<InstitutionalRepo> {
    spec.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let (name, template) = entry.split_once('=')?;
            Some(InstitutionalRepo {
                name: name.trim().to_string(),
                url_template: template.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_repo_list_splits_name_and_template() {
        let repos = parse_repo_list("mit=https://dspace.mit.edu/doi/{doi},ucl=https://discovery.ucl.ac.uk/{doi}");
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "mit");
        assert_eq!(repos[1].url_template, "https://discovery.ucl.ac.uk/{doi}");
    }

    #[test]
    fn candidates_substitutes_doi_into_template() {
        let client = InstitutionalClient::new(vec![InstitutionalRepo {
            name: "mit".to_string(),
            url_template: "https://dspace.mit.edu/doi/{doi}".to_string(),
        }]);
        let candidates = client.candidates("10.1/x");
        assert_eq!(candidates[0].url, "https://dspace.mit.edu/doi/10.1/x");
        assert_eq!(candidates[0].source, "institutional:mit");
    }

    #[test]
    fn parse_repo_list_skips_empty_entries() {
        assert!(parse_repo_list("").is_empty());
        assert!(parse_repo_list("  ,  ").is_empty());
    }
}
