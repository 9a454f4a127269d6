use std::sync::Arc;

use actix_web::web::Data;
use actix_web::Error;
use actix_web::HttpResponse;
use paperclip::actix::{api_v2_operation, web};

use booktech_common::api::Caller;
use booktech_common::clock::now_millis;

use crate::api::{
    BookId, ProgressUpdate, ReadingProgress, ReadingStats, ReadingTimeReport,
    MAX_CLOCK_SKEW_MILLIS, MAX_REPORTED_SECONDS,
};
use crate::progress_repository::{ProgressRepository, ProgressRepositoryError};

type Progress = Data<Arc<dyn ProgressRepository>>;

fn repository_failure(operation: &str, err: ProgressRepositoryError) -> HttpResponse {
    tracing::error!("{} failed {}", operation, err);
    HttpResponse::InternalServerError().finish()
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn get_all_progress(progress: Progress, caller: Caller) -> Result<HttpResponse, Error> {
    Ok(match progress.list_progress(caller.user_id).await {
        Ok(books) => HttpResponse::Ok().json(books),
        Err(err) => repository_failure("Get all progress", err),
    })
}

#[api_v2_operation]
pub async fn get_progress(
    progress: Progress,
    caller: Caller,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(
        match progress
            .get_progress(caller.user_id, book_id.into_inner())
            .await
        {
            Ok(Some(book_progress)) => HttpResponse::Ok().json(book_progress),
            Ok(None) => HttpResponse::NotFound().finish(),
            Err(err) => repository_failure("Get progress", err),
        },
    )
}

#[api_v2_operation]
pub async fn update_progress(
    progress: Progress,
    caller: Caller,
    book_id: web::Path<BookId>,
    update: web::Json<ProgressUpdate>,
) -> Result<HttpResponse, Error> {
    let book_id = book_id.into_inner();
    let update = update.into_inner();
    if update.total_pages == 0 {
        return Ok(HttpResponse::BadRequest().json("total_pages must be at least 1"));
    }
    let now = now_millis();
    let updated_at = update
        .updated_at
        .map_or(now, |updated_at| updated_at.min(now + MAX_CLOCK_SKEW_MILLIS));
    let new_progress = ReadingProgress::new(book_id, update.page, update.total_pages, updated_at);

    Ok(
        match progress.save_progress(caller.user_id, new_progress).await {
            Ok(outcome) => {
                if !outcome.accepted {
                    tracing::info!(
                        "Stale progress for user {} book {} ignored",
                        caller.user_id,
                        book_id
                    );
                }
                HttpResponse::Ok().json(outcome)
            }
            Err(err) => repository_failure("Update progress", err),
        },
    )
}

#[api_v2_operation]
pub async fn report_reading_time(
    progress: Progress,
    caller: Caller,
    book_id: web::Path<BookId>,
    report: web::Json<ReadingTimeReport>,
) -> Result<HttpResponse, Error> {
    let report = report.into_inner();
    if report.seconds > MAX_REPORTED_SECONDS {
        return Ok(HttpResponse::BadRequest().json(format!(
            "A report covers at most {} seconds",
            MAX_REPORTED_SECONDS
        )));
    }
    Ok(
        match progress
            .add_reading_time(caller.user_id, book_id.into_inner(), report)
            .await
        {
            Ok(()) => HttpResponse::Ok().finish(),
            Err(err) => repository_failure("Report reading time", err),
        },
    )
}

#[api_v2_operation]
pub async fn get_stats(progress: Progress, caller: Caller) -> Result<HttpResponse, Error> {
    let books = match progress.list_progress(caller.user_id).await {
        Ok(books) => books,
        Err(err) => return Ok(repository_failure("Get stats", err)),
    };
    let totals = match progress.reading_totals(caller.user_id).await {
        Ok(totals) => totals,
        Err(err) => return Ok(repository_failure("Get stats", err)),
    };

    let finished = books.iter().filter(|book| book.is_finished()).count() as u32;
    Ok(HttpResponse::Ok().json(ReadingStats {
        total_seconds: totals.seconds,
        total_pages_turned: totals.pages,
        books_in_progress: books.len() as u32 - finished,
        books_finished: finished,
    }))
}

#[cfg(test)]
mod handler_tests {
    use std::sync::Arc;

    use actix_web::http::header::AUTHORIZATION;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use actix_web::web::Data;
    use actix_web::App;
    use paperclip::actix::OpenApiExt;

    use booktech_common::api::{Caller, Role};
    use booktech_common::auth::{SessionVerifier, StaticSessionVerifier};

    use booktech_common::clock::now_millis;

    use crate::api::{
        ProgressUpdate, ProgressUpdateOutcome, ReadingProgress, ReadingStats, ReadingTimeReport,
        MAX_CLOCK_SKEW_MILLIS,
    };
    use crate::app_config::config_app;
    use crate::progress_repository::{InMemoryProgressRepository, ProgressRepository};

    const READER: &str = "Bearer reader-token";
    const OTHER_READER: &str = "Bearer other-reader-token";

    fn verifier() -> Arc<dyn SessionVerifier> {
        Arc::new(
            StaticSessionVerifier::default()
                .with_session(
                    "reader-token",
                    Caller {
                        user_id: 1,
                        role: Role::Customer,
                    },
                )
                .with_session(
                    "other-reader-token",
                    Caller {
                        user_id: 2,
                        role: Role::Customer,
                    },
                ),
        )
    }

    macro_rules! test_app {
        () => {{
            let repository: Arc<dyn ProgressRepository> =
                Arc::new(InMemoryProgressRepository::default());
            actix_test::init_service(
                App::new()
                    .wrap_api()
                    .app_data(Data::new(repository))
                    .app_data(Data::new(verifier()))
                    .configure(config_app)
                    .build(),
            )
            .await
        }};
    }

    fn put_progress(token: &str, book_id: i32, update: ProgressUpdate) -> actix_test::TestRequest {
        actix_test::TestRequest::put()
            .uri(&format!("/api/progress/{}", book_id))
            .insert_header((AUTHORIZATION, token.to_string()))
            .set_json(update)
    }

    #[actix_web::test]
    /// Progress is per user, clamped, and the newest change wins
    async fn test_progress_sync() {
        let app = test_app!();

        let req = actix_test::TestRequest::get()
            .uri("/api/progress/7")
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::UNAUTHORIZED
        );

        let req = actix_test::TestRequest::get()
            .uri("/api/progress/7")
            .insert_header((AUTHORIZATION, READER))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        let update = |page, updated_at| ProgressUpdate {
            page,
            total_pages: 300,
            updated_at: Some(updated_at),
        };

        let outcome: ProgressUpdateOutcome =
            actix_test::call_and_read_body_json(&app, put_progress(READER, 7, update(120, 2_000)).to_request())
                .await;
        assert!(outcome.accepted);
        assert_eq!(outcome.progress.percent, 40);

        let outcome: ProgressUpdateOutcome =
            actix_test::call_and_read_body_json(&app, put_progress(READER, 7, update(80, 1_000)).to_request())
                .await;
        assert!(!outcome.accepted);
        assert_eq!(outcome.progress.page, 120);

        let outcome: ProgressUpdateOutcome =
            actix_test::call_and_read_body_json(&app, put_progress(READER, 7, update(999, 3_000)).to_request())
                .await;
        assert_eq!(outcome.progress.page, 300);
        assert_eq!(outcome.progress.percent, 100);

        let response = actix_test::call_service(
            &app,
            put_progress(
                READER,
                7,
                ProgressUpdate {
                    page: 1,
                    total_pages: 0,
                    updated_at: None,
                },
            )
            .to_request(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::get()
            .uri("/api/progress/7")
            .insert_header((AUTHORIZATION, OTHER_READER))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        actix_test::call_service(&app, put_progress(READER, 8, update(3, 4_000)).to_request()).await;
        let req = actix_test::TestRequest::get()
            .uri("/api/progress")
            .insert_header((AUTHORIZATION, READER))
            .to_request();
        let all: Vec<ReadingProgress> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            all.iter().map(|p| p.book_id).collect::<Vec<_>>(),
            vec![8, 7]
        );
    }

    #[actix_web::test]
    async fn test_future_timestamps_are_clamped() {
        let app = test_app!();

        let outcome: ProgressUpdateOutcome = actix_test::call_and_read_body_json(
            &app,
            put_progress(
                READER,
                7,
                ProgressUpdate {
                    page: 50,
                    total_pages: 300,
                    updated_at: Some(i64::MAX),
                },
            )
            .to_request(),
        )
        .await;
        assert!(outcome.accepted);
        assert!(outcome.progress.updated_at <= now_millis() + MAX_CLOCK_SKEW_MILLIS);

        let outcome: ProgressUpdateOutcome = actix_test::call_and_read_body_json(
            &app,
            put_progress(
                READER,
                7,
                ProgressUpdate {
                    page: 60,
                    total_pages: 300,
                    updated_at: Some(now_millis() + 2 * MAX_CLOCK_SKEW_MILLIS),
                },
            )
            .to_request(),
        )
        .await;
        assert!(outcome.accepted);
        assert_eq!(outcome.progress.page, 60);
    }

    #[actix_web::test]
    async fn test_reading_stats() {
        let app = test_app!();

        actix_test::call_service(
            &app,
            put_progress(
                READER,
                7,
                ProgressUpdate {
                    page: 10,
                    total_pages: 10,
                    updated_at: None,
                },
            )
            .to_request(),
        )
        .await;
        actix_test::call_service(
            &app,
            put_progress(
                READER,
                8,
                ProgressUpdate {
                    page: 2,
                    total_pages: 10,
                    updated_at: None,
                },
            )
            .to_request(),
        )
        .await;

        for report in [
            ReadingTimeReport {
                seconds: 30,
                pages: 3,
            },
            ReadingTimeReport {
                seconds: 25,
                pages: 1,
            },
        ] {
            let req = actix_test::TestRequest::post()
                .uri("/api/progress/7/time")
                .insert_header((AUTHORIZATION, READER))
                .set_json(report)
                .to_request();
            assert!(actix_test::call_service(&app, req).await.status().is_success());
        }

        let req = actix_test::TestRequest::post()
            .uri("/api/progress/7/time")
            .insert_header((AUTHORIZATION, READER))
            .set_json(ReadingTimeReport {
                seconds: 100_000,
                pages: 1,
            })
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = actix_test::TestRequest::get()
            .uri("/api/progress/stats")
            .insert_header((AUTHORIZATION, READER))
            .to_request();
        let stats: ReadingStats = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            stats,
            ReadingStats {
                total_seconds: 55,
                total_pages_turned: 4,
                books_in_progress: 1,
                books_finished: 1,
            }
        );
    }
}
