//! Metadata carried in schema comments.
//!
//! `; @name foo` names an otherwise anonymous entry, choice or inline record.
//! `; @newtype` turns an alias rule into a wrapper type. Every other line is
//! documentation and is passed through verbatim.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleMetadata {
    pub name:       Option<String>,
    pub is_newtype: bool,
    pub doc:        Vec<String>,
}

impl RuleMetadata {
    pub fn from_comments(comments: &[String]) -> RuleMetadata {
        let mut metadata = RuleMetadata::default();
        for line in comments {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix("@name") {
                if name.starts_with(char::is_whitespace) && !name.trim().is_empty() {
                    metadata.name = Some(name.trim().to_owned());
                    continue;
                }
            }
            if trimmed == "@newtype" {
                metadata.is_newtype = true;
                continue;
            }
            metadata.doc.push(line.clone());
        }
        metadata
    }

    /// Documentation as a single block, or `None` when there is none.
    pub fn doc_text(&self) -> Option<String> {
        if self.doc.is_empty() {
            None
        } else {
            Some(self.doc.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_metadata_is_split_from_docs() {
        let metadata = RuleMetadata::from_comments(&lines(&["A thing.", "@name widget", "  indented", "@newtype"]));
        assert_eq!(metadata.name.as_deref(), Some("widget"));
        assert!(metadata.is_newtype);
        assert_eq!(metadata.doc, lines(&["A thing.", "  indented"]));
        assert_eq!(metadata.doc_text().as_deref(), Some("A thing.\n  indented"));
    }

    #[test]
    fn test_lookalikes_stay_in_docs() {
        let metadata = RuleMetadata::from_comments(&lines(&["@names are fine", "@name"]));
        assert_eq!(metadata.name, None);
        assert_eq!(metadata.doc.len(), 2);
        assert_eq!(RuleMetadata::from_comments(&[]).doc_text(), None);
    }
}
