//! Prediction service: subject check, classification, suggestion, and the
//! append-only assessment store. Records are inserted once and only ever
//! read back, ordered newest first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use psyche_core::assessment::{AssessmentRecord, Language, SymptomScores};

use crate::engine::classifier::ModelHandle;
use crate::engine::suggestion::SuggestionOrchestrator;
use crate::error::AppError;

/// Classify, generate a suggestion, and persist one assessment.
///
/// The subject check runs before any model work so an unknown user costs
/// neither inference nor a write. A classifier failure surfaces as
/// service-unavailable; suggestion failures never surface at all.
pub async fn predict(
    pool: &PgPool,
    classifier: &Arc<ModelHandle>,
    suggestions: &SuggestionOrchestrator,
    user_id: Uuid,
    scores: SymptomScores,
    language: Language,
) -> Result<AssessmentRecord, AppError> {
    ensure_user_exists(pool, user_id).await?;

    // The first call loads and optimizes the model artifact, so inference
    // runs on the blocking pool instead of an async worker thread.
    let model = Arc::clone(classifier);
    let severity = tokio::task::spawn_blocking(move || model.classify(&scores))
        .await
        .map_err(|e| AppError::Internal(format!("classification task failed: {e}")))?
        .map_err(|e| AppError::ModelUnavailable {
            message: e.to_string(),
        })?;

    let suggestion = suggestions.suggest(severity, language, &scores).await;

    let row = sqlx::query_as::<_, AssessmentRow>(
        r#"
        INSERT INTO assessments
            (id, user_id, appetite, interest, fatigue, worthlessness, concentration,
             agitation, suicidal_ideation, sleep_disturbance, aggression, panic_attacks,
             hopelessness, restlessness, severity, suggestion, language)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING id, user_id, appetite, interest, fatigue, worthlessness, concentration,
                  agitation, suicidal_ideation, sleep_disturbance, aggression, panic_attacks,
                  hopelessness, restlessness, severity, suggestion, language, recorded_at
        "#,
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(scores.appetite)
    .bind(scores.interest)
    .bind(scores.fatigue)
    .bind(scores.worthlessness)
    .bind(scores.concentration)
    .bind(scores.agitation)
    .bind(scores.suicidal_ideation)
    .bind(scores.sleep_disturbance)
    .bind(scores.aggression)
    .bind(scores.panic_attacks)
    .bind(scores.hopelessness)
    .bind(scores.restlessness)
    .bind(severity.as_i16())
    .bind(&suggestion)
    .bind(language.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row.into_record())
}

/// All assessments for a subject, newest first. Empty is a valid result;
/// an unknown subject is not.
pub async fn history(pool: &PgPool, user_id: Uuid) -> Result<Vec<AssessmentRecord>, AppError> {
    ensure_user_exists(pool, user_id).await?;

    let rows = sqlx::query_as::<_, AssessmentRow>(
        r#"
        SELECT id, user_id, appetite, interest, fatigue, worthlessness, concentration,
               agitation, suicidal_ideation, sleep_disturbance, aggression, panic_attacks,
               hopelessness, restlessness, severity, suggestion, language, recorded_at
        FROM assessments
        WHERE user_id = $1
        ORDER BY recorded_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AssessmentRow::into_record).collect())
}

/// The most recent assessment for a subject, or None when the subject has
/// no records yet.
pub async fn latest(pool: &PgPool, user_id: Uuid) -> Result<Option<AssessmentRecord>, AppError> {
    ensure_user_exists(pool, user_id).await?;

    let row = sqlx::query_as::<_, AssessmentRow>(
        r#"
        SELECT id, user_id, appetite, interest, fatigue, worthlessness, concentration,
               agitation, suicidal_ideation, sleep_disturbance, aggression, panic_attacks,
               hopelessness, restlessness, severity, suggestion, language, recorded_at
        FROM assessments
        WHERE user_id = $1
        ORDER BY recorded_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(AssessmentRow::into_record))
}

async fn ensure_user_exists(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound {
            message: "User not found.".to_string(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: Uuid,
    user_id: Uuid,
    appetite: i16,
    interest: i16,
    fatigue: i16,
    worthlessness: i16,
    concentration: i16,
    agitation: i16,
    suicidal_ideation: i16,
    sleep_disturbance: i16,
    aggression: i16,
    panic_attacks: i16,
    hopelessness: i16,
    restlessness: i16,
    severity: i16,
    suggestion: String,
    language: String,
    recorded_at: DateTime<Utc>,
}

impl AssessmentRow {
    fn into_record(self) -> AssessmentRecord {
        AssessmentRecord {
            id: self.id,
            user_id: self.user_id,
            scores: SymptomScores {
                appetite: self.appetite,
                interest: self.interest,
                fatigue: self.fatigue,
                worthlessness: self.worthlessness,
                concentration: self.concentration,
                agitation: self.agitation,
                suicidal_ideation: self.suicidal_ideation,
                sleep_disturbance: self.sleep_disturbance,
                aggression: self.aggression,
                panic_attacks: self.panic_attacks,
                hopelessness: self.hopelessness,
                restlessness: self.restlessness,
            },
            depression_state: self.severity,
            generated_suggestion: self.suggestion,
            language: self.language,
            recorded_at: self.recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuggestionConfig;
    use crate::engine::classifier::testing::FnClassifier;
    use crate::engine::classifier::{NUM_FEATURES, RawClassifier, RawOutput, testing};
    use psyche_core::suggestion::local_suggestion;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn db_pool_if_available() -> Option<PgPool> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .ok()?;

        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");

        Some(pool)
    }

    fn local_only_orchestrator() -> SuggestionOrchestrator {
        SuggestionOrchestrator::from_config(&SuggestionConfig {
            enabled: false,
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
        })
    }

    fn sample_scores() -> SymptomScores {
        SymptomScores {
            appetite: 3,
            interest: 2,
            fatigue: 4,
            worthlessness: 2,
            concentration: 3,
            agitation: 2,
            suicidal_ideation: 1,
            sleep_disturbance: 5,
            aggression: 1,
            panic_attacks: 2,
            hopelessness: 2,
            restlessness: 3,
        }
    }

    async fn insert_test_user(pool: &PgPool) -> Uuid {
        let user_id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(format!("user-{user_id}"))
        .bind(format!("user-{user_id}@example.com"))
        .bind("unused-hash")
        .execute(pool)
        .await
        .expect("insert test user");
        user_id
    }

    #[tokio::test]
    async fn predict_unknown_user_runs_no_inference_and_writes_nothing() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let classifier = Arc::new(ModelHandle::with_loader(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FnClassifier(|_: &[f32; NUM_FEATURES]| {
                Ok(RawOutput::Scalar(1.0))
            })) as Box<dyn RawClassifier>)
        })));

        let missing_user = Uuid::now_v7();
        let err = predict(
            &pool,
            &classifier,
            &local_only_orchestrator(),
            missing_user,
            sample_scores(),
            Language::En,
        )
        .await
        .expect_err("unknown user must fail");

        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(loads.load(Ordering::SeqCst), 0, "model must not be loaded");

        let written = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM assessments WHERE user_id = $1",
        )
        .bind(missing_user)
        .fetch_one(&pool)
        .await
        .expect("count assessments");
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn predict_roundtrips_as_head_of_history() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        let user_id = insert_test_user(&pool).await;
        let classifier = Arc::new(testing::handle_returning(RawOutput::Categorical([
            0.1, 0.7, 0.1, 0.1,
        ])));
        let orchestrator = local_only_orchestrator();

        let record = predict(
            &pool,
            &classifier,
            &orchestrator,
            user_id,
            sample_scores(),
            Language::En,
        )
        .await
        .expect("predict should succeed");

        assert_eq!(record.user_id, user_id);
        assert_eq!(record.depression_state, 1);
        assert_eq!(
            record.generated_suggestion,
            local_suggestion(psyche_core::assessment::Severity::Mild, Language::En)
        );
        assert_eq!(record.scores, sample_scores());

        let records = history(&pool, user_id).await.expect("history");
        assert_eq!(records.first().map(|r| r.id), Some(record.id));

        let newest = latest(&pool, user_id).await.expect("latest");
        assert_eq!(newest.map(|r| r.id), Some(record.id));
    }

    #[tokio::test]
    async fn history_is_ordered_newest_first_and_empty_is_ok() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        let user_id = insert_test_user(&pool).await;
        assert!(history(&pool, user_id).await.expect("empty history").is_empty());
        assert!(latest(&pool, user_id).await.expect("no latest").is_none());

        let classifier = Arc::new(testing::handle_returning(RawOutput::Scalar(2.0)));
        let orchestrator = local_only_orchestrator();
        for _ in 0..3 {
            predict(
                &pool,
                &classifier,
                &orchestrator,
                user_id,
                sample_scores(),
                Language::Id,
            )
            .await
            .expect("predict");
        }

        let records = history(&pool, user_id).await.expect("history");
        assert_eq!(records.len(), 3);
        for pair in records.windows(2) {
            assert!(pair[0].recorded_at >= pair[1].recorded_at);
        }
    }

    #[tokio::test]
    async fn history_unknown_user_is_not_found() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        let err = history(&pool, Uuid::now_v7())
            .await
            .expect_err("unknown user must fail");
        assert!(matches!(err, AppError::NotFound { .. }));

        let err = latest(&pool, Uuid::now_v7())
            .await
            .expect_err("unknown user must fail");
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn failed_model_load_is_service_unavailable_and_writes_nothing() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };

        let user_id = insert_test_user(&pool).await;
        let classifier = Arc::new(ModelHandle::with_loader(Box::new(|| {
            Err("model file not found: psyche_model.onnx".to_string())
        })));

        let err = predict(
            &pool,
            &classifier,
            &local_only_orchestrator(),
            user_id,
            sample_scores(),
            Language::En,
        )
        .await
        .expect_err("missing model must fail");
        assert!(matches!(err, AppError::ModelUnavailable { .. }));

        let written = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM assessments WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .expect("count assessments");
        assert_eq!(written, 0);
    }
}
