use serde::Deserialize;
use std::collections::HashMap;

use super::common::*;

/// A scholarly work: an article, book, dataset, preprint, or other research
/// output. Trimmed to the fields `oracle-sources`'s OpenAlex client and
/// `oracle-pipeline`'s relevance scorer actually read; see
/// `examples/mmgeorge-papers-mcp/openalex/src/types/work.rs` for the full
/// 30-odd-field upstream type.
#[derive(Debug, Clone, Deserialize)]
pub struct Work {
    /// OpenAlex ID URI (e.g. `"https://openalex.org/W2741809807"`).
    pub id: String,

    /// DOI URL (e.g. `"https://doi.org/10.7717/peerj.4375"`).
    pub doi: Option<String>,

    pub title: Option<String>,
    pub display_name: Option<String>,
    pub publication_year: Option<i32>,
    pub publication_date: Option<String>,
    pub r#type: Option<String>,

    /// External identifiers, including PMID/PMCID for cross-referencing with
    /// the universal identifier.
    pub ids: Option<WorkIds>,

    pub primary_location: Option<Location>,
    pub best_oa_location: Option<Location>,
    pub open_access: Option<OpenAccess>,

    pub authorships: Option<Vec<Authorship>>,

    pub cited_by_count: Option<i64>,

    pub keywords: Option<Vec<Keyword>>,
    pub mesh: Option<Vec<MeshTerm>>,

    /// Abstract stored as an inverted index: word -> position(s). Reconstruct
    /// with [`reconstruct_abstract`].
    pub abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
}

impl Work {
    /// Best display title, preferring `title` over `display_name`.
    pub fn best_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.display_name.as_deref())
    }

    /// Reconstructs plain abstract text from `abstract_inverted_index`, if
    /// present. OpenAlex stores abstracts this way to respect publisher
    /// copyright on the exact wording while still indexing full text.
    pub fn reconstruct_abstract(&self) -> Option<String> {
        let index = self.abstract_inverted_index.as_ref()?;
        let mut slots: Vec<(u32, &str)> = Vec::new();
        for (word, positions) in index {
            for &pos in positions {
                slots.push((pos, word.as_str()));
            }
        }
        slots.sort_by_key(|(pos, _)| *pos);
        Some(slots.into_iter().map(|(_, w)| w).collect::<Vec<_>>().join(" "))
    }

    /// Bare PMID (no URL prefix), if known.
    pub fn pmid(&self) -> Option<String> {
        self.ids.as_ref()?.pmid.as_deref().map(|url| {
            url.rsplit('/').next().unwrap_or(url).to_string()
        })
    }

    /// Best direct PDF URL across primary and OA locations, if any.
    pub fn pdf_url(&self) -> Option<&str> {
        self.best_oa_location
            .as_ref()
            .and_then(|l| l.pdf_url.as_deref())
            .or_else(|| self.primary_location.as_ref().and_then(|l| l.pdf_url.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruct_abstract_orders_by_position() {
        let mut index = HashMap::new();
        index.insert("world".to_string(), vec![1]);
        index.insert("hello".to_string(), vec![0]);
        let work = Work {
            id: "W1".into(),
            doi: None,
            title: None,
            display_name: None,
            publication_year: None,
            publication_date: None,
            r#type: None,
            ids: None,
            primary_location: None,
            best_oa_location: None,
            open_access: None,
            authorships: None,
            cited_by_count: None,
            keywords: None,
            mesh: None,
            abstract_inverted_index: Some(index),
        };
        assert_eq!(work.reconstruct_abstract().as_deref(), Some("hello world"));
    }
}
