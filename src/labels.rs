use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Self::Negative, Self::Neutral, Self::Positive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps positions of the model's output vector to sentiments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    by_index: [Sentiment; 3],
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            by_index: Sentiment::ALL,
        }
    }
}

/// How a [`LabelSet`] was obtained from model metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    Metadata,
    Fallback,
}

impl LabelSet {
    pub fn get(&self, index: usize) -> Option<Sentiment> {
        self.by_index.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Sentiment)> + '_ {
        self.by_index.iter().copied().enumerate()
    }

    /// Resolve the label order from a `config.json` `id2label` table.
    ///
    /// Named labels must be exactly the three sentiments in some order.
    /// Generic `LABEL_<n>` names, or no table at all, fall back to
    /// negative/neutral/positive.
    pub fn from_id2label(
        id2label: Option<&HashMap<String, String>>,
    ) -> Result<(Self, LabelSource), String> {
        let Some(id2label) = id2label else {
            return Ok((Self::default(), LabelSource::Fallback));
        };
        if id2label.len() != Sentiment::ALL.len() {
            return Err(format!(
                "model declares {} classes, expected {}",
                id2label.len(),
                Sentiment::ALL.len()
            ));
        }

        let mut entries = Vec::with_capacity(id2label.len());
        for (id, name) in id2label {
            let index: usize = id
                .parse()
                .map_err(|_| format!("id2label key {id:?} is not an index"))?;
            if index >= Sentiment::ALL.len() {
                return Err(format!("id2label index {index} is out of range"));
            }
            entries.push((index, name.as_str()));
        }

        if entries.iter().all(|(_, name)| is_generic(name)) {
            return Ok((Self::default(), LabelSource::Fallback));
        }

        let mut slots: [Option<Sentiment>; 3] = [None; 3];
        for (index, name) in entries {
            let sentiment = Sentiment::parse(name)
                .ok_or_else(|| format!("unknown label {name:?} at index {index}"))?;
            if slots.contains(&Some(sentiment)) {
                return Err(format!("label {sentiment} appears more than once"));
            }
            slots[index] = Some(sentiment);
        }

        match slots {
            [Some(a), Some(b), Some(c)] => Ok((Self { by_index: [a, b, c] }, LabelSource::Metadata)),
            _ => Err("id2label does not cover every index".to_string()),
        }
    }
}

fn is_generic(name: &str) -> bool {
    name.strip_prefix("LABEL_")
        .is_some_and(|n| n.parse::<usize>().is_ok())
}
