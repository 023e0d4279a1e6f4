use super::*;
use crate::state::test_helpers::{self, BotCall, MockBot};
use crate::state::{Cell, Mark};
use crate::telegram::types::{Chat, Message, PhotoSize};

const CHAT: ChatId = 42;

fn setup(file_bytes: Vec<u8>) -> (Controller, Arc<MockBot>, Arc<RwLock<SessionStore>>) {
    let bot = Arc::new(MockBot::new(file_bytes));
    let sessions = Arc::new(RwLock::new(SessionStore::default()));
    let controller = Controller::new(sessions.clone(), bot.clone());
    (controller, bot, sessions)
}

fn message(text: Option<&str>, photo: Vec<PhotoSize>) -> Message {
    Message { chat: Chat { id: CHAT }, text: text.map(str::to_string), photo }
}

fn photo_update() -> Update {
    let sizes = vec![
        PhotoSize { file_id: "thumb".into(), width: 90, height: 60 },
        PhotoSize { file_id: "full".into(), width: 1200, height: 800 },
    ];
    Update { update_id: 1, message: Some(message(None, sizes)), callback_query: None }
}

fn tap_update(data: &str) -> Update {
    Update {
        update_id: 2,
        message: None,
        callback_query: Some(CallbackQuery {
            id: format!("cbq:{data}"),
            data: Some(data.to_string()),
            message: Some(message(None, vec![])),
        }),
    }
}

async fn start_session(controller: &Controller) -> String {
    match controller.handle_update(photo_update()).await.unwrap() {
        Outcome::SessionCreated(id) => id,
        other => panic!("expected a new session, got {other:?}"),
    }
}

async fn marks_of(sessions: &Arc<RwLock<SessionStore>>, id: &str) -> BTreeMap<Cell, Mark> {
    sessions.read().await.get(id).unwrap().marks.clone()
}

// =============================================================================
// Photo / start
// =============================================================================

#[tokio::test]
async fn photo_creates_session_and_sends_grid() {
    let (controller, bot, sessions) = setup(test_helpers::test_png(1200, 800));
    let id = start_session(&controller).await;

    let store = sessions.read().await;
    let session = store.get(&id).unwrap();
    assert_eq!((session.rows, session.cols), (5, 5));
    assert!(session.marks.is_empty());
    assert_eq!(session.mode, Mark::Star);
    drop(store);

    let calls = bot.calls();
    assert_eq!(calls[0], BotCall::Download { file_id: "full".into() });
    let BotCall::Photo { chat_id, png, caption, keyboard } = &calls[1] else {
        panic!("expected photo, got {:?}", calls[1]);
    };
    assert_eq!(*chat_id, CHAT);
    assert_eq!(caption.as_deref(), Some("شبكة 5×5"));
    assert_eq!(keyboard, &build_keyboard(&id, 5, 5));
    let rendered = render::decode(png).unwrap();
    assert_eq!(rendered.width(), 900);
}

#[tokio::test]
async fn each_photo_gets_its_own_session() {
    let (controller, _bot, sessions) = setup(test_helpers::test_png(50, 50));
    let a = start_session(&controller).await;
    let b = start_session(&controller).await;
    assert_ne!(a, b);
    assert_eq!(sessions.read().await.len(), 2);
}

#[tokio::test]
async fn undecodable_photo_reports_to_user() {
    let (controller, bot, sessions) = setup(b"not an image".to_vec());
    let outcome = controller.handle_update(photo_update()).await.unwrap();
    assert_eq!(outcome, Outcome::DecodeFailed);
    assert!(sessions.read().await.is_empty());
    assert!(bot.photos().is_empty());
    assert!(bot.calls().contains(&BotCall::Message { chat_id: CHAT, text: DECODE_FAILED_TEXT.into() }));
}

#[tokio::test]
async fn start_command_greets() {
    let (controller, bot, _sessions) = setup(vec![]);
    let update = Update { update_id: 3, message: Some(message(Some("/start"), vec![])), callback_query: None };
    assert_eq!(controller.handle_update(update).await.unwrap(), Outcome::Greeted);
    assert_eq!(bot.calls(), vec![BotCall::Message { chat_id: CHAT, text: START_TEXT.into() }]);
}

#[tokio::test]
async fn plain_text_and_empty_updates_are_ignored() {
    let (controller, bot, _sessions) = setup(vec![]);
    let text = Update { update_id: 4, message: Some(message(Some("hello"), vec![])), callback_query: None };
    let empty = Update { update_id: 5, message: None, callback_query: None };
    assert_eq!(controller.handle_update(text).await.unwrap(), Outcome::Ignored);
    assert_eq!(controller.handle_update(empty).await.unwrap(), Outcome::Ignored);
    assert!(bot.calls().is_empty());
}

// =============================================================================
// Taps
// =============================================================================

#[tokio::test]
async fn tap_marks_star_then_unmarks() {
    let (controller, bot, sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;

    let outcome = controller.handle_update(tap_update(&format!("{id}|2|3"))).await.unwrap();
    assert_eq!(outcome, Outcome::Rerendered(id.clone()));
    assert_eq!(marks_of(&sessions, &id).await, BTreeMap::from([(Cell::new(2, 3), Mark::Star)]));

    controller.handle_update(tap_update(&format!("{id}|2|3"))).await.unwrap();
    assert!(marks_of(&sessions, &id).await.is_empty());

    // Initial grid plus one new message per tap.
    assert_eq!(bot.photos().len(), 3);
}

#[tokio::test]
async fn mode_toggle_then_tap_marks_bomb() {
    let (controller, _bot, sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;

    controller.handle_update(tap_update(&format!("{id}|mode"))).await.unwrap();
    assert_eq!(sessions.read().await.get(&id).unwrap().mode, Mark::Bomb);

    controller.handle_update(tap_update(&format!("{id}|0|0"))).await.unwrap();
    assert_eq!(marks_of(&sessions, &id).await, BTreeMap::from([(Cell::new(0, 0), Mark::Bomb)]));

    controller.handle_update(tap_update(&format!("{id}|mode"))).await.unwrap();
    assert_eq!(sessions.read().await.get(&id).unwrap().mode, Mark::Star);
}

#[tokio::test]
async fn clear_empties_marks_and_rerenders() {
    let (controller, bot, sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;
    for data in ["1|1", "2|2", "3|4"] {
        controller.handle_update(tap_update(&format!("{id}|{data}"))).await.unwrap();
    }
    assert_eq!(marks_of(&sessions, &id).await.len(), 3);

    let outcome = controller.handle_update(tap_update(&format!("{id}|clear"))).await.unwrap();
    assert_eq!(outcome, Outcome::Rerendered(id.clone()));
    assert!(marks_of(&sessions, &id).await.is_empty());
    assert_eq!(bot.photos().len(), 5);
}

#[tokio::test]
async fn rerender_matches_direct_render_and_has_no_caption() {
    let (controller, bot, sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;
    controller.handle_update(tap_update(&format!("{id}|4|0"))).await.unwrap();

    let expected = {
        let store = sessions.read().await;
        let session = store.get(&id).unwrap();
        render::render(&session.base_image, 5, 5, &session.marks).unwrap()
    };
    let photos = bot.photos();
    let Some(BotCall::Photo { png, caption, keyboard, .. }) = photos.last() else {
        panic!("expected a photo");
    };
    assert_eq!(png, &expected);
    assert_eq!(caption, &None);
    assert_eq!(keyboard, &build_keyboard(&id, 5, 5));
}

#[tokio::test]
async fn taps_are_acknowledged_before_rendering() {
    let (controller, bot, _sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;
    let data = format!("{id}|0|1");
    controller.handle_update(tap_update(&data)).await.unwrap();

    let calls = bot.calls();
    let answer = calls
        .iter()
        .position(|c| *c == BotCall::Answer { callback_query_id: format!("cbq:{data}") })
        .unwrap();
    let last_photo = calls.iter().rposition(|c| matches!(c, BotCall::Photo { .. })).unwrap();
    assert!(answer < last_photo);
}

#[tokio::test]
async fn unknown_session_is_silently_ignored() {
    let (controller, bot, sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;

    let outcome = controller.handle_update(tap_update("ffffffff|1|1")).await.unwrap();
    assert_eq!(outcome, Outcome::Ignored);
    assert!(marks_of(&sessions, &id).await.is_empty());
    assert_eq!(bot.photos().len(), 1);
    assert!(bot.calls().contains(&BotCall::Answer { callback_query_id: "cbq:ffffffff|1|1".into() }));
    assert!(!bot.calls().iter().any(|c| matches!(c, BotCall::Message { .. })));
}

#[tokio::test]
async fn malformed_and_out_of_grid_taps_are_ignored() {
    let (controller, bot, sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;

    for data in ["garbage".to_string(), format!("{id}|9|9"), format!("{id}|x|1"), format!("{id}|paint")] {
        let outcome = controller.handle_update(tap_update(&data)).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored, "data {data:?}");
    }
    assert!(marks_of(&sessions, &id).await.is_empty());
    assert_eq!(bot.photos().len(), 1);
}

#[tokio::test]
async fn tap_without_message_leaves_state_untouched() {
    let (controller, bot, sessions) = setup(test_helpers::test_png(100, 100));
    let id = start_session(&controller).await;

    let update = Update {
        update_id: 9,
        message: None,
        callback_query: Some(CallbackQuery { id: "q".into(), data: Some(format!("{id}|0|0")), message: None }),
    };
    assert_eq!(controller.handle_update(update).await.unwrap(), Outcome::Ignored);
    assert!(marks_of(&sessions, &id).await.is_empty());
    assert_eq!(bot.photos().len(), 1);
}

#[tokio::test]
async fn failed_acknowledgement_does_not_block_the_tap() {
    let bot = Arc::new(MockBot { fail_answers: true, ..MockBot::new(test_helpers::test_png(100, 100)) });
    let sessions = Arc::new(RwLock::new(SessionStore::default()));
    let controller = Controller::new(sessions.clone(), bot.clone());
    let id = start_session(&controller).await;

    let outcome = controller.handle_update(tap_update(&format!("{id}|1|2"))).await.unwrap();
    assert_eq!(outcome, Outcome::Rerendered(id.clone()));
    assert_eq!(marks_of(&sessions, &id).await.len(), 1);
}

#[tokio::test]
async fn evicted_session_behaves_as_unknown() {
    let bot = Arc::new(MockBot::new(test_helpers::test_png(40, 40)));
    let sessions = Arc::new(RwLock::new(SessionStore::new(1)));
    let controller = Controller::new(sessions.clone(), bot.clone());
    let first = start_session(&controller).await;
    let second = start_session(&controller).await;

    let outcome = controller.handle_update(tap_update(&format!("{first}|0|0"))).await.unwrap();
    assert_eq!(outcome, Outcome::Ignored);
    let outcome = controller.handle_update(tap_update(&format!("{second}|0|0"))).await.unwrap();
    assert_eq!(outcome, Outcome::Rerendered(second));
}

// =============================================================================
// Bot API failures
// =============================================================================

#[tokio::test]
async fn failed_download_is_an_error_and_creates_nothing() {
    let bot = Arc::new(MockBot { fail_downloads: true, ..MockBot::new(test_helpers::test_png(40, 40)) });
    let sessions = Arc::new(RwLock::new(SessionStore::default()));
    let controller = Controller::new(sessions.clone(), bot.clone());

    let err = controller.handle_update(photo_update()).await.unwrap_err();
    assert!(matches!(err, ControllerError::Telegram(TelegramError::ApiRequest(_))), "got {err:?}");
    assert!(sessions.read().await.is_empty());
    assert!(bot.photos().is_empty());
}

#[tokio::test]
async fn failed_initial_send_drops_the_session() {
    let bot = Arc::new(MockBot { fail_photos: true, ..MockBot::new(test_helpers::test_png(40, 40)) });
    let sessions = Arc::new(RwLock::new(SessionStore::default()));
    let controller = Controller::new(sessions.clone(), bot.clone());

    let err = controller.handle_update(photo_update()).await.unwrap_err();
    assert!(matches!(err, ControllerError::Telegram(TelegramError::Rejected { .. })), "got {err:?}");
    assert_eq!(bot.photos().len(), 1);
    assert!(sessions.read().await.is_empty());
}

#[tokio::test]
async fn failed_rerender_send_keeps_the_applied_tap() {
    let bot = Arc::new(MockBot { fail_photos: true, ..MockBot::new(test_helpers::test_png(40, 40)) });
    let sessions = Arc::new(RwLock::new(SessionStore::default()));
    let session = crate::state::Session::new(Arc::new(test_helpers::test_image(40, 40)));
    let id = sessions.write().await.create(session);
    let controller = Controller::new(sessions.clone(), bot.clone());

    let err = controller.handle_update(tap_update(&format!("{id}|3|3"))).await.unwrap_err();
    assert!(matches!(err, ControllerError::Telegram(_)), "got {err:?}");
    assert_eq!(marks_of(&sessions, &id).await, BTreeMap::from([(Cell::new(3, 3), Mark::Star)]));
}
