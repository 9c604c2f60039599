use assetquery_core::Entity;

/// Predicted tag for one (non-special) token, with its byte span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenTag {
    pub offsets: (usize, usize),
    pub tag: String,
}

struct Span<'a> {
    label: &'a str,
    start: usize,
    end: usize,
}

/// Groups BIO-tagged tokens into entities. `I-` tags that do not continue an open entity of
/// the same label start a new one; bare labels (IO schemes) behave like `I-`.
pub fn decode_bio(text: &str, tags: &[TokenTag]) -> Vec<Entity> {
    let mut out = Vec::new();
    let mut open: Option<Span<'_>> = None;
    for t in tags {
        let (begin, label) = match t.tag.split_once('-') {
            Some(("B", label)) => (true, label),
            Some(("I", label)) => (false, label),
            _ if t.tag == "O" => {
                close(text, open.take(), &mut out);
                continue;
            }
            _ => (false, t.tag.as_str()),
        };
        let continues = matches!(&open, Some(span) if !begin && span.label == label);
        if continues {
            if let Some(span) = open.as_mut() {
                span.end = t.offsets.1;
            }
        } else {
            close(text, open.take(), &mut out);
            open = Some(Span {
                label,
                start: t.offsets.0,
                end: t.offsets.1,
            });
        }
    }
    close(text, open, &mut out);
    out
}

fn close(text: &str, span: Option<Span<'_>>, out: &mut Vec<Entity>) {
    let Some(span) = span else { return };
    if let Some(s) = text.get(span.start..span.end) {
        let s = s.trim();
        if !s.is_empty() {
            out.push(Entity::new(span.label, s));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(start: usize, end: usize, tag: &str) -> TokenTag {
        TokenTag {
            offsets: (start, end),
            tag: tag.to_string(),
        }
    }

    #[test]
    fn merges_inside_tags() {
        let text = "issues at Acme Labs since March";
        let tags = [
            tag(0, 6, "O"),
            tag(7, 9, "O"),
            tag(10, 14, "B-ORG"),
            tag(15, 19, "I-ORG"),
            tag(20, 25, "O"),
            tag(26, 31, "B-DATE"),
        ];
        assert_eq!(
            decode_bio(text, &tags),
            vec![Entity::new("ORG", "Acme Labs"), Entity::new("DATE", "March")]
        );
    }

    #[test]
    fn begin_splits_adjacent_entities() {
        let text = "Alice Bob";
        let tags = [tag(0, 5, "B-PER"), tag(6, 9, "B-PER")];
        assert_eq!(
            decode_bio(text, &tags),
            vec![Entity::new("PER", "Alice"), Entity::new("PER", "Bob")]
        );
    }

    #[test]
    fn stray_inside_tag_opens_entity() {
        let text = "in Paris";
        let tags = [tag(0, 2, "O"), tag(3, 8, "I-GPE")];
        assert_eq!(decode_bio(text, &tags), vec![Entity::new("GPE", "Paris")]);
    }

    #[test]
    fn label_change_closes_entity() {
        let text = "Acme Paris";
        let tags = [tag(0, 4, "B-ORG"), tag(5, 10, "I-GPE")];
        assert_eq!(
            decode_bio(text, &tags),
            vec![Entity::new("ORG", "Acme"), Entity::new("GPE", "Paris")]
        );
    }

    #[test]
    fn out_of_bounds_offsets_are_dropped() {
        let tags = [tag(0, 40, "B-ORG")];
        assert!(decode_bio("short", &tags).is_empty());
    }
}
