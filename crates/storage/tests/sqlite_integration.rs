use chrono::Duration;
use course_core::McqResult;
use course_core::model::{
    Chapter, ChapterId, Course, CourseId, Lesson, LessonContent, LessonId, McqQuestion,
    QuestionId, UserId,
};
use course_core::time::fixed_now;
use storage::repository::{CourseCatalog, ProgressStore, StorageError};
use storage::sqlite::SqliteRepository;

fn build_course() -> Course {
    let ch1 = Chapter::new(
        ChapterId::new(1),
        CourseId::new(1),
        1,
        "Ownership",
        vec![
            Lesson::new(
                LessonId::new(11),
                ChapterId::new(1),
                1,
                "Moves",
                LessonContent::video("https://cdn.example.com/moves.mp4").unwrap(),
                true,
            )
            .unwrap(),
            Lesson::new(
                LessonId::new(12),
                ChapterId::new(1),
                2,
                "Borrows",
                LessonContent::images([
                    "https://cdn.example.com/b1.png",
                    "https://cdn.example.com/b2.png",
                ])
                .unwrap(),
                false,
            )
            .unwrap(),
        ],
        vec![
            McqQuestion::new(
                QuestionId::new(100),
                ChapterId::new(1),
                "Which keyword borrows mutably?",
                vec!["&".into(), "&mut".into(), "move".into()],
                1,
            )
            .unwrap(),
            McqQuestion::new(
                QuestionId::new(101),
                ChapterId::new(1),
                "Can a value have two owners?",
                vec!["yes".into(), "no".into()],
                1,
            )
            .unwrap(),
        ],
    )
    .unwrap();

    let ch2 = Chapter::new(
        ChapterId::new(2),
        CourseId::new(1),
        2,
        "Traits",
        vec![
            Lesson::new(
                LessonId::new(21),
                ChapterId::new(2),
                1,
                "Defining traits",
                LessonContent::text("trait Speak { fn speak(&self); }").unwrap(),
                false,
            )
            .unwrap(),
        ],
        Vec::new(),
    )
    .unwrap();

    Course::new(CourseId::new(1), "Rust in Practice", vec![ch2, ch1]).unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_course_structure() {
    let repo = connect("memdb_course_roundtrip").await;
    let course = build_course();
    repo.upsert_course(&course).await.unwrap();

    let fetched = repo.get_course(course.id()).await.unwrap().expect("course");
    assert_eq!(fetched, course);
    assert_eq!(
        repo.course_for_chapter(ChapterId::new(2)).await.unwrap(),
        Some(CourseId::new(1))
    );
    assert_eq!(repo.get_course(CourseId::new(404)).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_upsert_replaces_structure_and_keeps_progress() {
    let repo = connect("memdb_course_replace").await;
    let course = build_course();
    repo.upsert_course(&course).await.unwrap();

    let user = UserId::new(5);
    repo.record_lesson_completed(user, ChapterId::new(2), LessonId::new(21), fixed_now())
        .await
        .unwrap();

    // Re-publish with chapter 2 renamed.
    let ch2 = Chapter::new(
        ChapterId::new(2),
        CourseId::new(1),
        2,
        "Traits and generics",
        course.chapters()[1].lessons().to_vec(),
        Vec::new(),
    )
    .unwrap();
    let republished = Course::new(
        CourseId::new(1),
        course.title(),
        vec![course.chapters()[0].clone(), ch2],
    )
    .unwrap();
    repo.upsert_course(&republished).await.unwrap();

    let fetched = repo.get_course(course.id()).await.unwrap().unwrap();
    assert_eq!(fetched.chapters()[1].title(), "Traits and generics");

    let snap = repo.course_progress(user, course.id()).await.unwrap();
    assert!(snap.lesson_completed(ChapterId::new(2), LessonId::new(21)));
}

#[tokio::test]
async fn sqlite_progress_merges_monotonically() {
    let repo = connect("memdb_progress_merge").await;
    repo.upsert_course(&build_course()).await.unwrap();
    let user = UserId::new(1);

    for lesson in [11, 12, 11] {
        repo.record_lesson_completed(user, ChapterId::new(1), LessonId::new(lesson), fixed_now())
            .await
            .unwrap();
    }

    let fail = McqResult {
        chapter_id: ChapterId::new(1),
        passed: false,
        score: 1,
        total_questions: 2,
    };
    let pass = McqResult {
        passed: true,
        score: 2,
        ..fail
    };

    repo.record_mcq_result(user, &fail, fixed_now()).await.unwrap();
    let snap = repo.course_progress(user, CourseId::new(1)).await.unwrap();
    let ch1 = snap.chapter(ChapterId::new(1)).unwrap();
    assert!(ch1.mcq_attempted());
    assert!(!ch1.mcq_passed());
    assert_eq!(ch1.completed_lesson_ids().len(), 2);

    let passed_at = fixed_now() + Duration::minutes(10);
    repo.record_mcq_result(user, &pass, passed_at).await.unwrap();
    // A late failure (e.g. from a second device) must not undo the pass.
    repo.record_mcq_result(user, &fail, passed_at + Duration::minutes(5))
        .await
        .unwrap();

    let snap = repo.course_progress(user, CourseId::new(1)).await.unwrap();
    let ch1 = snap.chapter(ChapterId::new(1)).unwrap();
    assert!(ch1.mcq_passed());
    assert_eq!(ch1.passed_at(), Some(passed_at));
}

#[tokio::test]
async fn sqlite_progress_is_scoped_to_course_and_user() {
    let repo = connect("memdb_progress_scope").await;
    repo.upsert_course(&build_course()).await.unwrap();

    repo.record_lesson_completed(UserId::new(1), ChapterId::new(1), LessonId::new(11), fixed_now())
        .await
        .unwrap();

    let other_user = repo
        .course_progress(UserId::new(2), CourseId::new(1))
        .await
        .unwrap();
    assert!(other_user.is_empty());

    let other_course = repo
        .course_progress(UserId::new(1), CourseId::new(2))
        .await
        .unwrap();
    assert!(other_course.is_empty());
}

fn second_course(lesson: u64, question: u64) -> Course {
    let chapter = Chapter::new(
        ChapterId::new(3),
        CourseId::new(2),
        1,
        "Async",
        vec![
            Lesson::new(
                LessonId::new(lesson),
                ChapterId::new(3),
                1,
                "Futures",
                LessonContent::text("poll until ready").unwrap(),
                false,
            )
            .unwrap(),
        ],
        vec![
            McqQuestion::new(
                QuestionId::new(question),
                ChapterId::new(3),
                "Are futures lazy?",
                vec!["yes".into(), "no".into()],
                0,
            )
            .unwrap(),
        ],
    )
    .unwrap();
    Course::new(CourseId::new(2), "Async Rust", vec![chapter]).unwrap()
}

#[tokio::test]
async fn sqlite_rejects_ids_owned_by_another_course() {
    let repo = connect("memdb_course_id_conflict").await;
    let course = build_course();
    repo.upsert_course(&course).await.unwrap();

    let reused_lesson = second_course(11, 300);
    assert!(matches!(
        repo.upsert_course(&reused_lesson).await,
        Err(StorageError::Conflict)
    ));
    let reused_question = second_course(31, 100);
    assert!(matches!(
        repo.upsert_course(&reused_question).await,
        Err(StorageError::Conflict)
    ));

    // Rejected writes leave nothing behind.
    assert_eq!(repo.get_course(CourseId::new(2)).await.unwrap(), None);
    assert_eq!(repo.get_course(course.id()).await.unwrap(), Some(course));

    repo.upsert_course(&second_course(31, 300)).await.unwrap();
    assert_eq!(
        repo.course_for_chapter(ChapterId::new(3)).await.unwrap(),
        Some(CourseId::new(2))
    );
}
