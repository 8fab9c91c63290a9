use super::*;

fn roles(conversation: &Conversation) -> Vec<ChatRole> {
    conversation.turns().iter().map(|turn| turn.role).collect()
}

fn texts(conversation: &Conversation) -> Vec<String> {
    conversation.turns().iter().map(|turn| turn.text()).collect()
}

#[test]
fn appends_keep_chronological_order() {
    let mut conversation = Conversation::with_system("be brief");
    conversation.append_user("hi").unwrap();
    conversation.append_assistant("hello").unwrap();
    conversation.append_user("again").unwrap();

    assert_eq!(
        roles(&conversation),
        vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
    );
    assert_eq!(conversation.last_user().unwrap().text(), "again");
}

#[test]
fn partial_turn_blocks_appends_until_resolved() {
    let mut conversation = Conversation::new();
    conversation.append_user("write an essay").unwrap();
    conversation.mark_partial("Once");
    conversation.mark_partial("Once upon");

    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.partial().unwrap().text(), "Once upon");
    assert!(matches!(
        conversation.append_user("next"),
        Err(LLMError::InvalidRequest(_))
    ));

    let resolved = conversation.resolve_partial("Once upon a time").unwrap();
    assert!(!resolved.is_partial());
    assert_eq!(resolved.text(), "Once upon a time");
    assert!(conversation.partial().is_none());
    conversation.append_user("next").unwrap();
}

#[test]
fn resolve_without_partial_is_an_error() {
    let mut conversation = Conversation::new();
    conversation.append_user("hi").unwrap();
    assert!(conversation.resolve_partial("x").is_err());
}

#[test]
fn seed_must_follow_user_turn_and_keeps_name() {
    let mut conversation = Conversation::new();
    assert!(conversation.seed_partial("Dr. Kelsier:", None).is_err());

    conversation.append_user("who are you?").unwrap();
    conversation
        .seed_partial("I am", Some("Kelsier".to_string()))
        .unwrap();
    let seed = conversation.partial().unwrap();
    assert_eq!(seed.partial, Some(PartialKind::Seed));
    assert_eq!(seed.name.as_deref(), Some("Kelsier"));

    conversation.mark_partial("I am the Survivor");
    let partial = conversation.partial().unwrap();
    assert_eq!(partial.partial, Some(PartialKind::Continuation));
    assert_eq!(partial.name.as_deref(), Some("Kelsier"));
}

#[test]
fn turns_since_starts_at_latest_role() {
    let mut conversation = Conversation::with_system("s");
    conversation.append_user("one").unwrap();
    conversation.append_assistant("a").unwrap();
    conversation.append_user("two").unwrap();
    conversation.mark_partial("b");

    let since = conversation.turns_since(ChatRole::User);
    assert_eq!(since.len(), 2);
    assert_eq!(since[0].text(), "two");
    assert!(conversation.turns_since(ChatRole::Tool).is_empty());
}

#[test]
fn clear_can_preserve_system_turns() {
    let mut conversation = Conversation::with_system("s");
    conversation.append_file_context("file body").unwrap();
    conversation.append_user("hi").unwrap();
    conversation.mark_partial("par");

    let mut kept = conversation.clone();
    kept.clear(true);
    assert_eq!(texts(&kept), vec!["s", "file body"]);
    assert!(kept.partial().is_none());

    conversation.clear(false);
    assert!(conversation.is_empty());
}

#[test]
fn replace_system_swaps_or_inserts() {
    let mut conversation = Conversation::new();
    conversation.append_user("hi").unwrap();
    conversation.replace_system("first");
    conversation.replace_system("second");
    assert_eq!(texts(&conversation), vec!["second", "hi"]);
}

#[test]
fn cache_ref_content_format() {
    let mut conversation = Conversation::new();
    conversation.append_cache_ref("docs", Some(3600)).unwrap();
    conversation.append_cache_ref("faq", None).unwrap();
    assert_eq!(texts(&conversation), vec!["tag=docs;reset_ttl=3600", "tag=faq"]);
    assert_eq!(conversation.turns()[0].role, ChatRole::Cache);
}

#[test]
fn rollback_restores_history() {
    let mut conversation = Conversation::new();
    conversation.append_user("q").unwrap();
    conversation.seed_partial("A:", None).unwrap();
    let checkpoint = conversation.checkpoint();

    conversation.mark_partial("A: something");
    conversation.rollback(checkpoint);
    assert_eq!(conversation.partial().unwrap().text(), "A:");
    assert_eq!(conversation.partial().unwrap().partial, Some(PartialKind::Seed));

    conversation.resolve_partial("A: done").unwrap();
    let checkpoint = conversation.checkpoint();
    conversation.append_user("more").unwrap();
    conversation.mark_partial("x");
    conversation.rollback(checkpoint);
    assert_eq!(texts(&conversation), vec!["q", "A: done"]);
}

#[test]
fn trim_keeps_system_and_recent_turns() {
    let mut conversation = Conversation::with_system("s");
    for i in 0..4 {
        conversation.append_user(format!("u{i}")).unwrap();
        conversation.append_assistant(format!("a{i}")).unwrap();
    }
    conversation.trim_to(3);
    assert_eq!(texts(&conversation), vec!["s", "a2", "u3", "a3"]);
}

#[test]
fn trim_drops_orphaned_tool_results() {
    let mut conversation = Conversation::new();
    conversation.append_user("weather?").unwrap();
    conversation.append_assistant("calling").unwrap();
    conversation.append_tool_result("call_1", "sunny").unwrap();
    conversation.append_assistant("it is sunny").unwrap();
    conversation.trim_to(2);
    assert_eq!(texts(&conversation), vec!["it is sunny"]);
}
