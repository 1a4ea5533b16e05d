use std::collections::{BTreeMap, HashSet};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Option label of a multiple-choice question, serialized as the bare letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnswerKey {
    A,
    B,
    C,
    D,
}

// Serialized through `serialize_str` rather than `serialize_unit_variant` so
// the letter is accepted as a map key by serializers (e.g. SurrealDB's) that
// only take plain strings there; the JSON shape is identical either way.
impl Serialize for AnswerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        })
    }
}

impl<'de> Deserialize<'de> for AnswerKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let letter = String::deserialize(deserializer)?;
        match letter.as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            other => Err(de::Error::unknown_variant(other, &["A", "B", "C", "D"])),
        }
    }
}

/// A single generated multiple-choice question. The exact `question` text is
/// the deduplication key; `question_id` and `source_file` are filled in by the
/// flat-file store and the sync pipeline respectively and omitted from JSON
/// until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: BTreeMap<AnswerKey, String>,
    pub correct_answer: AnswerKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

/// Ordered sequence of questions in which no two elements share the same
/// `question` text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionSet(Vec<Question>);

impl QuestionSet {
    /// Merges an existing set with newly generated questions, existing-first.
    /// Duplicates by exact `question` text keep the first occurrence, so an
    /// existing entry always wins over a new one with identical text.
    pub fn merged(existing: Vec<Question>, incoming: Vec<Question>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for question in existing.into_iter().chain(incoming) {
            if seen.insert(question.question.clone()) {
                unique.push(question);
            }
        }
        Self(unique)
    }

    /// Assigns identifiers to questions that do not have one yet, continuing
    /// after the highest persisted id. Ids already present are never changed,
    /// which keeps them stable across repeated saves and sync passes.
    pub fn assign_missing_ids(&mut self) {
        let mut next = self
            .0
            .iter()
            .filter_map(|q| q.question_id)
            .max()
            .map_or(1, |max| max.saturating_add(1));
        for question in &mut self.0 {
            if question.question_id.is_none() {
                question.question_id = Some(next);
                next = next.saturating_add(1);
            }
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Question> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, correct: AnswerKey) -> Question {
        let options = BTreeMap::from([
            (AnswerKey::A, "first".to_string()),
            (AnswerKey::B, "second".to_string()),
            (AnswerKey::C, "third".to_string()),
            (AnswerKey::D, "fourth".to_string()),
        ]);
        Question {
            question: text.to_string(),
            options,
            correct_answer: correct,
            question_id: None,
            source_file: None,
        }
    }

    #[test]
    fn merged_keeps_existing_entry_on_duplicate_text() {
        let existing = vec![question("X", AnswerKey::A)];
        let incoming = vec![question("X", AnswerKey::B)];

        let merged = QuestionSet::merged(existing, incoming);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.questions()[0].correct_answer, AnswerKey::A);
    }

    #[test]
    fn merged_is_idempotent() {
        let set = vec![question("one", AnswerKey::A), question("two", AnswerKey::B)];

        let once = QuestionSet::merged(Vec::new(), set.clone());
        let twice = QuestionSet::merged(once.clone().into_inner(), set);

        assert_eq!(once, twice);
    }

    #[test]
    fn merged_preserves_existing_first_order() {
        let existing = vec![question("a", AnswerKey::A), question("b", AnswerKey::B)];
        let incoming = vec![question("c", AnswerKey::C), question("a", AnswerKey::D)];

        let merged = QuestionSet::merged(existing, incoming);

        let texts: Vec<&str> = merged.questions().iter().map(|q| q.question.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn assign_missing_ids_continues_after_highest_persisted_id() {
        let mut existing = question("kept", AnswerKey::A);
        existing.question_id = Some(7);
        let mut set = QuestionSet::merged(vec![existing], vec![question("new", AnswerKey::B)]);

        set.assign_missing_ids();

        assert_eq!(set.questions()[0].question_id, Some(7));
        assert_eq!(set.questions()[1].question_id, Some(8));
    }

    #[test]
    fn assign_missing_ids_is_stable_across_repeated_calls() {
        let mut set = QuestionSet::merged(
            Vec::new(),
            vec![question("one", AnswerKey::A), question("two", AnswerKey::B)],
        );
        set.assign_missing_ids();
        let first_pass: Vec<Option<u32>> =
            set.questions().iter().map(|q| q.question_id).collect();

        set.assign_missing_ids();
        let second_pass: Vec<Option<u32>> =
            set.questions().iter().map(|q| q.question_id).collect();

        assert_eq!(first_pass, vec![Some(1), Some(2)]);
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn question_serializes_without_absent_provenance() {
        let serialized = serde_json::to_string(&question("plain", AnswerKey::C))
            .expect("question should serialize");

        assert!(!serialized.contains("question_id"));
        assert!(!serialized.contains("source_file"));
        assert!(serialized.contains("\"correct_answer\":\"C\""));
    }
}
