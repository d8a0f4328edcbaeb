use crate::classifier::{Error, Result};
use crate::labels::{LabelSet, Sentiment};
use candle_core::{DType, Tensor, D};
use serde::Serialize;

/// Softmax over the class dimension of a `[1, num_labels]` logits tensor.
pub fn probabilities(logits: &Tensor) -> Result<Vec<f32>> {
    let probs = candle_nn::ops::softmax(&logits.to_dtype(DType::F32)?, D::Minus1)?;
    Ok(probs.squeeze(0)?.to_vec1()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probabilities {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl Probabilities {
    #[cfg(test)]
    pub fn get(&self, sentiment: Sentiment) -> f64 {
        match sentiment {
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
            Sentiment::Positive => self.positive,
        }
    }

    fn set(&mut self, sentiment: Sentiment, value: f64) {
        match sentiment {
            Sentiment::Negative => self.negative = value,
            Sentiment::Neutral => self.neutral = value,
            Sentiment::Positive => self.positive = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub sentiment: Sentiment,
    pub probabilities: Probabilities,
}

impl Prediction {
    /// Pick the most likely class and report every class rounded to four
    /// decimals. Ties go to the lowest index.
    pub fn from_probabilities(labels: &LabelSet, probs: &[f32]) -> Result<Self> {
        if probs.len() != Sentiment::ALL.len() {
            return Err(Error::OutputShape {
                expected: Sentiment::ALL.len(),
                actual: probs.len(),
            });
        }

        if probs.iter().any(|p| !p.is_finite()) {
            return Err(Error::NonFinite);
        }
        // Reversed so that among equal maxima the lowest index wins.
        let (best, _) = probs
            .iter()
            .enumerate()
            .rev()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or(Error::OutputShape {
                expected: Sentiment::ALL.len(),
                actual: 0,
            })?;

        let mut probabilities = Probabilities {
            negative: 0.0,
            neutral: 0.0,
            positive: 0.0,
        };
        for (i, sentiment) in labels.iter() {
            probabilities.set(sentiment, round4(probs[i]));
        }

        let sentiment = labels.get(best).ok_or(Error::OutputShape {
            expected: Sentiment::ALL.len(),
            actual: best + 1,
        })?;
        Ok(Self {
            sentiment,
            probabilities,
        })
    }
}

fn round4(p: f32) -> f64 {
    (f64::from(p) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn logits(values: &[f32]) -> Tensor {
        Tensor::new(values, &Device::Cpu)
            .unwrap()
            .unsqueeze(0)
            .unwrap()
    }

    #[test]
    fn softmax_is_a_distribution() {
        let probs = probabilities(&logits(&[-1.5, 0.25, 3.0])).unwrap();
        assert_eq!(probs.len(), 3);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn picks_argmax_and_rounds() {
        let probs = probabilities(&logits(&[0.1, 0.2, 2.0])).unwrap();
        let prediction = Prediction::from_probabilities(&LabelSet::default(), &probs).unwrap();

        assert_eq!(prediction.sentiment, Sentiment::Positive);
        let p = prediction.probabilities;
        for value in [p.negative, p.neutral, p.positive] {
            assert_eq!(value, (value * 10_000.0).round() / 10_000.0);
        }
        assert!((p.negative + p.neutral + p.positive - 1.0).abs() <= 0.0003);
        let max = p.negative.max(p.neutral).max(p.positive);
        assert_eq!(p.get(prediction.sentiment), max);
    }

    #[test]
    fn uniform_logits_pick_first_label() {
        let probs = probabilities(&logits(&[0.0, 0.0, 0.0])).unwrap();
        let prediction = Prediction::from_probabilities(&LabelSet::default(), &probs).unwrap();
        assert_eq!(prediction.sentiment, Sentiment::Negative);
        assert_eq!(prediction.probabilities.neutral, 0.3333);
    }

    #[test]
    fn respects_label_order() {
        let id2label = [("0", "positive"), ("1", "negative"), ("2", "neutral")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let (labels, _) = LabelSet::from_id2label(Some(&id2label)).unwrap();

        let prediction = Prediction::from_probabilities(&labels, &[0.7, 0.2, 0.1]).unwrap();
        assert_eq!(prediction.sentiment, Sentiment::Positive);
        assert_eq!(prediction.probabilities.positive, 0.7);
        assert_eq!(prediction.probabilities.negative, 0.2);
        assert_eq!(prediction.probabilities.neutral, 0.1);
    }

    #[test]
    fn rejects_wrong_width() {
        let err = Prediction::from_probabilities(&LabelSet::default(), &[0.5, 0.5]).unwrap_err();
        assert!(matches!(
            err,
            Error::OutputShape {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn serializes_with_three_keys() {
        let prediction =
            Prediction::from_probabilities(&LabelSet::default(), &[0.1, 0.3, 0.6]).unwrap();
        let json = serde_json::to_value(prediction).unwrap();

        assert_eq!(json["sentiment"], "positive");
        let probabilities = json["probabilities"].as_object().unwrap();
        let mut keys: Vec<_> = probabilities.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["negative", "neutral", "positive"]);
    }

    #[test]
    fn rejects_non_finite_probabilities() {
        let nan = probabilities(&logits(&[f32::NAN, 0.0, 1.0])).unwrap();
        let err = Prediction::from_probabilities(&LabelSet::default(), &nan).unwrap_err();
        assert!(matches!(err, Error::NonFinite));

        let err = Prediction::from_probabilities(&LabelSet::default(), &[0.2, f32::INFINITY, 0.3])
            .unwrap_err();
        assert!(matches!(err, Error::NonFinite));
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let prediction =
            Prediction::from_probabilities(&LabelSet::default(), &[0.1, 0.45, 0.45]).unwrap();
        assert_eq!(prediction.sentiment, Sentiment::Neutral);
    }
}
