//! End-to-end scenarios: train each recommender on a small log and score it.

use std::collections::HashSet;
use streamline_core::config::{FactorizationConfig, KnnConfig, ModelConfig, Strategy};
use streamline_core::{Interaction, ItemId};
use streamline_evaluation::{ideal_dcg_at_k, ndcg_at_k, precision_at_k, recall_at_k, Evaluator};
use streamline_models::{favorite_item, Recommender, RecommenderModel};

fn three_rows() -> Vec<Interaction> {
    vec![
        Interaction::new(1, 10, 5.0),
        Interaction::new(1, 20, 3.0),
        Interaction::new(2, 10, 4.0),
    ]
}

fn library() -> Vec<Interaction> {
    let mut data = Vec::new();
    for user in 1..=20 {
        for item in 1..=8 {
            if (user + item) % 3 != 0 {
                data.push(Interaction::new(user, item, ((user * item) % 5 + 1) as f64));
            }
        }
    }
    data
}

fn model_config(strategy: Strategy) -> ModelConfig {
    ModelConfig {
        strategy,
        knn: KnnConfig {
            k_neighbors: 1,
            ..Default::default()
        },
        factorization: FactorizationConfig {
            factors: 1,
            iterations: 1,
        },
    }
}

#[test]
fn test_knn_anchors_on_favorite_and_skips_it() {
    let data = three_rows();
    let model = RecommenderModel::train(&data, &model_config(Strategy::ItemKnn)).unwrap();
    assert_eq!(favorite_item(1, &data), Some(10));

    let recs = model.recommend(1, &data, 1).unwrap();
    assert_eq!(model.resolve_items(&recs), vec![20]);
}

#[test]
fn test_knn_never_returns_anchor_with_tied_twin() {
    // Items 20 and 10 are rated only by user 1, so they sit at cosine
    // distance zero from each other. The anchor is the later one.
    let data = vec![Interaction::new(1, 20, 3.0), Interaction::new(1, 10, 5.0)];
    let model = RecommenderModel::train(&data, &model_config(Strategy::ItemKnn)).unwrap();
    let anchor = favorite_item(1, &data).unwrap();

    let recs = model.recommend(1, &data, 1).unwrap();
    let ids = model.resolve_items(&recs);
    assert_eq!(ids, vec![20]);
    assert!(!ids.contains(&anchor));
}

#[test]
fn test_factorization_never_returns_seen_items() {
    let data = three_rows();
    let model =
        RecommenderModel::train(&data, &model_config(Strategy::MatrixFactorization)).unwrap();
    let recs = model.recommend(1, &data, 1).unwrap();
    let ids = model.resolve_items(&recs);
    assert!(!ids.contains(&10));
    assert!(!ids.contains(&20));
}

#[test]
fn test_ndcg_matches_hand_computed_value() {
    let truth: HashSet<ItemId> = [2].into_iter().collect();
    let value = ndcg_at_k(&[1, 2, 3], &truth, 3);
    assert_eq!(value, 1.0 / 3.0f64.log2());
}

#[test]
fn test_perfect_ranking_scores_one() {
    let truth: HashSet<ItemId> = [4, 5, 6].into_iter().collect();
    let recs = vec![6, 4, 5];
    assert_eq!(precision_at_k(&recs, &truth, 3).unwrap(), 1.0);
    assert_eq!(recall_at_k(&recs, &truth, 3).unwrap(), 1.0);
    assert!((ndcg_at_k(&recs, &truth, 3) - ideal_dcg_at_k(3, 3)).abs() < 1e-12);
}

#[test]
fn test_every_strategy_produces_bounded_metrics() {
    let data = library();
    let k = 3;
    for strategy in [Strategy::Popularity, Strategy::ItemKnn, Strategy::MatrixFactorization] {
        let model = RecommenderModel::train(&data, &model_config(strategy)).unwrap();
        let mut evaluator = Evaluator::with_seed(10, 123).unwrap();
        let result = evaluator.evaluate_model(&model, &data, k).unwrap();

        assert_eq!(result.sampled_users, 10);
        assert!(result.evaluated_users <= result.sampled_users);
        assert!((0.0..=1.0).contains(&result.precision), "{strategy}: {result:?}");
        assert!((0.0..=1.0).contains(&result.recall), "{strategy}: {result:?}");
        assert!(result.ndcg >= 0.0 && result.ndcg <= ideal_dcg_at_k(k, k) + 1e-12);
    }
}

#[test]
fn test_popularity_on_training_data_hits_seen_items() {
    // Ground truth is the full history, so the most popular items are mostly hits.
    let data = library();
    let model = RecommenderModel::train(&data, &model_config(Strategy::Popularity)).unwrap();
    let mut evaluator = Evaluator::with_seed(100, 5).unwrap();
    let result = evaluator.evaluate_model(&model, &data, 2).unwrap();
    assert_eq!(result.sampled_users, 20);
    assert_eq!(result.evaluated_users, 20);
    assert!(result.precision > 0.0);
}

#[test]
fn test_result_serializes_with_counts() {
    let data = three_rows();
    let model = RecommenderModel::train(&data, &model_config(Strategy::Popularity)).unwrap();
    let result = Evaluator::with_seed(5, 0)
        .unwrap()
        .evaluate_model(&model, &data, 1)
        .unwrap();
    let json = serde_json::to_value(result).unwrap();
    assert_eq!(json["sampled_users"], 2);
    assert_eq!(json["evaluated_users"], 2);
    // Item 10 is the most popular and both users have it.
    assert_eq!(json["precision"], 1.0);
}
