use super::*;
use crate::analysis::forest::{ForestParams, RandomForest};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Estimator returning a fixed distribution and counting its calls
struct FixedModel {
    proba: Vec<f64>,
    width: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl ProbabilisticModel for FixedModel {
    fn n_features(&self) -> Option<usize> {
        self.width
    }

    fn n_classes(&self) -> usize {
        self.proba.len()
    }

    fn predict_proba(&self, _x: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.proba.clone())
    }
}

fn five_classes() -> LabelEncoding {
    LabelEncoding::fit(["hungry", "belly_pain", "burping", "discomfort", "tired"])
}

/// Helper to create a classifier over the five classes with a fixed output
fn create_classifier(proba: Vec<f64>) -> (CryClassifier, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = FixedModel {
        proba,
        width: Some(53),
        calls: Arc::clone(&calls),
    };
    let classifier = CryClassifier::new(Box::new(model), five_classes()).unwrap();
    (classifier, calls)
}

#[test]
fn test_predict_returns_label_in_class_set() {
    let (classifier, _) = create_classifier(vec![0.1, 0.2, 0.4, 0.2, 0.1]);
    let result = classifier.predict(&[0.0; 53]).unwrap();

    assert!(classifier.classes().contains(&result.label));
    // classes sort to belly_pain, burping, discomfort, hungry, tired
    assert_eq!(result.label, "discomfort");
    assert!((0.0..=1.0).contains(&result.confidence));

    let keys: Vec<&String> = result.probabilities.keys().collect();
    let mut classes: Vec<&String> = classifier.classes().iter().collect();
    classes.sort();
    assert_eq!(keys, classes);
}

#[test]
fn test_confidence_is_max_and_distribution_sums_to_one() {
    let (classifier, _) = create_classifier(vec![0.05, 0.15, 0.1, 0.6, 0.1]);
    let result = classifier.predict(&[1.0; 53]).unwrap();

    let max = result
        .probabilities
        .values()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = result.probabilities.values().sum();

    assert_eq!(result.confidence, max);
    assert!((sum - 1.0).abs() <= 0.01, "sum = {}", sum);
    assert_eq!(result.label, "hungry");
}

#[test]
fn test_width_mismatch_never_reaches_estimator() {
    let (classifier, calls) = create_classifier(vec![0.2; 5]);

    for width in [52, 54, 10] {
        let err = classifier.predict(&vec![0.0; width]).unwrap_err();
        assert_eq!(
            err,
            ModelError::FeatureMismatch {
                expected: 53,
                actual: width
            }
        );
        assert!(err.message().contains(&format!("got {}", width)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    classifier.predict(&[0.0; 53]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_ties_go_to_first_class() {
    let (classifier, _) = create_classifier(vec![0.1, 0.35, 0.35, 0.1, 0.1]);
    let result = classifier.predict(&[0.0; 53]).unwrap();
    assert_eq!(result.label, "burping");
}

#[test]
fn test_width_defaults_to_feature_contract() {
    let model = FixedModel {
        proba: vec![0.5, 0.5],
        width: None,
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let classifier =
        CryClassifier::new(Box::new(model), LabelEncoding::fit(["a", "b"])).unwrap();
    assert_eq!(classifier.expected_width(), 53);
}

#[test]
fn test_class_count_mismatch_is_load_error() {
    let model = FixedModel {
        proba: vec![0.5, 0.5],
        width: Some(53),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let result = CryClassifier::new(Box::new(model), five_classes());
    assert!(matches!(result, Err(ModelError::ModelLoad { .. })));
}

#[test]
fn test_respond_wraps_errors() {
    let (classifier, _) = create_classifier(vec![0.2; 5]);

    let ok = classifier.respond(&[0.0; 53]);
    assert!(ok.is_success());
    assert_eq!(ok.message, None);

    let failed = classifier.respond(&[0.0; 52]);
    assert_eq!(failed.status, PredictionStatus::Error);
    assert_eq!(failed.prediction, "unknown");
    assert_eq!(failed.confidence, 0.0);
    assert!(failed.probabilities.is_empty());
    assert!(failed.message.unwrap().contains("Expected 53 features, got 52"));
}

#[test]
fn test_response_json_shape() {
    let (classifier, _) = create_classifier(vec![0.2; 5]);
    let json = serde_json::to_value(classifier.respond(&[0.0; 53])).unwrap();

    assert_eq!(json["status"], "success");
    assert_eq!(json["prediction"], "belly_pain");
    assert!(json.get("message").is_none());
    assert_eq!(json["probabilities"].as_object().unwrap().len(), 5);

    let json = serde_json::to_value(PredictionResponse::error("boom")).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "boom");
}

#[test]
fn test_predict_batch() {
    let (classifier, calls) = create_classifier(vec![0.2; 5]);
    let results = classifier
        .predict_batch(&[vec![0.0; 53], vec![1.0; 53]])
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(classifier
        .predict_batch(&[vec![0.0; 53], vec![0.0; 3]])
        .is_err());
}

#[test]
fn test_forest_backed_classifier() {
    let x: Vec<Vec<f64>> = (0..20)
        .map(|i| {
            let base = if i < 10 { 0.0 } else { 10.0 };
            vec![base + (i % 10) as f64 * 0.1; 53]
        })
        .collect();
    let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
    let params = ForestParams {
        n_trees: 5,
        ..ForestParams::default()
    };
    let forest = RandomForest::fit(&x, &y, 2, &params, 42).unwrap();
    let classifier = CryClassifier::from_artifacts(ModelArtifacts::new(
        forest,
        LabelEncoding::fit(["calm", "crying"]),
    ))
    .unwrap();

    assert_eq!(classifier.expected_width(), 53);
    assert_eq!(classifier.predict(&[10.5; 53]).unwrap().label, "crying");
    assert_eq!(classifier.predict(&[0.2; 53]).unwrap().label, "calm");
}

#[test]
fn test_model_handle_swap_keeps_in_flight_instance() {
    let (first, _) = create_classifier(vec![1.0, 0.0, 0.0, 0.0, 0.0]);
    let (second, _) = create_classifier(vec![0.0, 0.0, 0.0, 0.0, 1.0]);
    let handle = ModelHandle::new(first);

    let in_flight = handle.get();
    let previous = handle.swap(second);

    assert_eq!(in_flight.predict(&[0.0; 53]).unwrap().label, "belly_pain");
    assert!(Arc::ptr_eq(&in_flight, &previous));
    assert_eq!(handle.get().predict(&[0.0; 53]).unwrap().label, "tired");
}

#[test]
fn test_model_handle_failed_reload_keeps_current() {
    let (classifier, _) = create_classifier(vec![0.2; 5]);
    let handle = ModelHandle::new(classifier);
    let before = handle.get();

    assert!(handle.reload("/nonexistent/models").is_err());
    assert!(Arc::ptr_eq(&before, &handle.get()));
}

fn save_two_class_model(dir: &Path, classes: [&str; 2]) {
    let x: Vec<Vec<f64>> = (0..10)
        .map(|i| vec![if i < 5 { 0.0 } else { 5.0 }; 53])
        .collect();
    let y: Vec<usize> = (0..10).map(|i| usize::from(i >= 5)).collect();
    let params = ForestParams {
        n_trees: 3,
        ..ForestParams::default()
    };
    let forest = RandomForest::fit(&x, &y, 2, &params, 7).unwrap();
    ModelArtifacts::new(forest, LabelEncoding::fit(classes))
        .save(dir)
        .unwrap();
}

#[test]
fn test_model_handle_reload_returns_the_instance_it_installed() {
    let root = tempfile::tempdir().unwrap();
    let dir_a = root.path().join("a");
    let dir_b = root.path().join("b");
    save_two_class_model(&dir_a, ["calm", "crying"]);
    save_two_class_model(&dir_b, ["hungry", "tired"]);

    let (initial, _) = create_classifier(vec![0.2; 5]);
    let handle = Arc::new(ModelHandle::new(initial));

    let workers: Vec<_> = [(dir_a, "calm"), (dir_b, "hungry")]
        .into_iter()
        .map(|(dir, first_class)| {
            let handle = Arc::clone(&handle);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let loaded = handle.reload(&dir).unwrap();
                    assert_eq!(loaded.classes()[0], first_class);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let loaded = handle.reload(root.path().join("a")).unwrap();
    assert!(Arc::ptr_eq(&loaded, &handle.get()));
}
