use course_core::AnswerOutcome;
use course_core::model::{
    Chapter, ChapterId, Course, CourseId, Lesson, LessonContent, LessonId, McqQuestion,
    QuestionId, UserId,
};
use course_core::time::fixed_now;
use services::{AppServices, Clock, CourseView, McqStart, ProgressionService, ServicesConfig};
use storage::repository::{CourseCatalog, ProgressStore, Storage};

const LEARNER: UserId = UserId::new(42);
const COURSE: CourseId = CourseId::new(1);
const CH1: ChapterId = ChapterId::new(1);
const CH2: ChapterId = ChapterId::new(2);

/// Two chapters: the first has two lessons and a two-question MCQ, the second a
/// single lesson and no MCQ.
fn build_course() -> Course {
    let ch1 = Chapter::new(
        CH1,
        COURSE,
        1,
        "Getting started",
        vec![
            Lesson::new(
                LessonId::new(11),
                CH1,
                1,
                "Welcome",
                LessonContent::video("https://cdn.example.com/welcome.mp4").unwrap(),
                false,
            )
            .unwrap(),
            Lesson::new(
                LessonId::new(12),
                CH1,
                2,
                "Setup",
                LessonContent::text("Install the toolchain.").unwrap(),
                false,
            )
            .unwrap(),
        ],
        vec![
            McqQuestion::new(
                QuestionId::new(101),
                CH1,
                "Which tool builds Rust projects?",
                vec!["cargo".into(), "make".into()],
                0,
            )
            .unwrap(),
            McqQuestion::new(
                QuestionId::new(102),
                CH1,
                "Which file lists dependencies?",
                vec!["main.rs".into(), "Cargo.toml".into(), "build.rs".into()],
                1,
            )
            .unwrap(),
        ],
    )
    .unwrap();

    let ch2 = Chapter::new(
        CH2,
        COURSE,
        2,
        "Next steps",
        vec![
            Lesson::new(
                LessonId::new(21),
                CH2,
                1,
                "Where to go from here",
                LessonContent::images(["https://cdn.example.com/map.png"]).unwrap(),
                false,
            )
            .unwrap(),
        ],
        Vec::new(),
    )
    .unwrap();

    Course::new(COURSE, "Rust onboarding", vec![ch1, ch2]).unwrap()
}

async fn run_attempt(service: &ProgressionService, answers: &[usize]) -> CourseView {
    let McqStart::Started(mut attempt) = service.start_mcq(LEARNER, CH1).await.unwrap() else {
        panic!("expected a fresh attempt");
    };

    let mut view = None;
    for (i, selected) in answers.iter().enumerate() {
        let answer = service
            .answer_mcq(LEARNER, &mut attempt, *selected)
            .await
            .unwrap();
        if i + 1 < answers.len() {
            assert!(matches!(answer.outcome, AnswerOutcome::Next { .. }));
            assert!(answer.view.is_none());
        } else {
            assert!(matches!(answer.outcome, AnswerOutcome::Finished { .. }));
            view = answer.view;
        }
    }
    view.expect("finished attempt returns a view")
}

async fn walk_through_course(services: &AppServices) {
    services.catalog().upsert_course(&build_course()).await.unwrap();
    let progression = services.progression();

    let view = progression.get_course_view(LEARNER, COURSE).await.unwrap();
    assert!(!view.chapter(CH1).unwrap().locked);
    assert!(view.chapter(CH2).unwrap().locked);
    assert_eq!(view.current_chapter().map(|c| c.id), Some(CH1));
    assert_eq!(view.total_chapters, 2);
    assert_eq!(view.completed_chapters, 0);

    progression
        .on_lesson_viewed(LEARNER, CH1, LessonId::new(11))
        .await
        .unwrap();
    let view = progression
        .on_lesson_viewed(LEARNER, CH1, LessonId::new(12))
        .await
        .unwrap();
    assert!(!view.chapter(CH1).unwrap().completed);
    assert!(view.chapter(CH2).unwrap().locked);

    // One wrong answer fails the whole attempt.
    let view = run_attempt(&progression, &[0, 2]).await;
    let ch1 = view.chapter(CH1).unwrap();
    assert!(ch1.mcq_attempted);
    assert!(!ch1.mcq_passed);
    assert!(view.chapter(CH2).unwrap().locked);

    let view = run_attempt(&progression, &[0, 1]).await;
    assert!(view.chapter(CH1).unwrap().completed);
    assert!(!view.chapter(CH2).unwrap().locked);
    assert_eq!(view.current_chapter().map(|c| c.id), Some(CH2));

    let view = progression
        .on_lesson_viewed(LEARNER, CH2, LessonId::new(21))
        .await
        .unwrap();
    assert!(view.chapter(CH2).unwrap().completed);
    assert_eq!(view.completed_chapters, 2);
    assert!(view.completed);
    assert!(view.current_chapter().is_none());
    assert!(progression.pending_writes().is_empty());
}

#[tokio::test]
async fn course_walkthrough_in_memory() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()));
    walk_through_course(&services).await;
}

#[tokio::test]
async fn course_walkthrough_on_sqlite() {
    let config = ServicesConfig::shared_memory("memdb_progression_walkthrough");
    let services = AppServices::from_config(&config, Clock::fixed(fixed_now()))
        .await
        .expect("sqlite services");
    walk_through_course(&services).await;

    // A fresh controller over the same database sees the persisted progress.
    let reopened = AppServices::from_config(&config, Clock::fixed(fixed_now()))
        .await
        .expect("reopen");
    let view = reopened
        .progression()
        .get_course_view(LEARNER, COURSE)
        .await
        .unwrap();
    assert!(view.completed);
    assert!(view.chapter(CH1).unwrap().mcq_passed);
}

#[tokio::test]
async fn progress_is_per_learner() {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()));
    services.catalog().upsert_course(&build_course()).await.unwrap();
    let progression = services.progression();

    progression
        .on_lesson_viewed(LEARNER, CH1, LessonId::new(11))
        .await
        .unwrap();

    let other = progression
        .get_course_view(UserId::new(7), COURSE)
        .await
        .unwrap();
    assert!(other.chapters.iter().all(|c| c.lessons.iter().all(|l| !l.completed)));
}

#[tokio::test]
async fn passed_at_comes_from_the_clock() {
    let storage = Storage::in_memory();
    storage.catalog.upsert_course(&build_course()).await.unwrap();
    let services = AppServices::from_storage(storage.clone(), Clock::fixed(fixed_now()));
    let progression = services.progression();

    progression
        .on_lesson_viewed(LEARNER, CH1, LessonId::new(11))
        .await
        .unwrap();
    progression
        .on_lesson_viewed(LEARNER, CH1, LessonId::new(12))
        .await
        .unwrap();
    run_attempt(&progression, &[0, 1]).await;

    let snapshot = storage.progress.course_progress(LEARNER, COURSE).await.unwrap();
    assert_eq!(snapshot.chapter(CH1).unwrap().passed_at(), Some(fixed_now()));
}
