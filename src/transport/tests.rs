use super::*;

#[tokio::test]
async fn reads_non_empty_lines_as_messages() {
    let input: &[u8] = b"What is Mapeo?\n\n   \n  Does it sync?  \n";
    let mut transport = ConsoleTransport::new(input, Vec::new(), "console");

    let first = transport
        .next_message()
        .await
        .expect("read should succeed")
        .expect("first message");
    assert_eq!(
        first,
        IncomingMessage {
            requester_id: "console".to_string(),
            text: "What is Mapeo?".to_string(),
        }
    );

    let second = transport
        .next_message()
        .await
        .expect("read should succeed")
        .expect("second message");
    assert_eq!(second.text, "Does it sync?");

    assert!(
        transport
            .next_message()
            .await
            .expect("read should succeed")
            .is_none()
    );
}

#[tokio::test]
async fn replies_are_written_as_paragraphs() {
    let input: &[u8] = b"hello\n";
    let mut transport = ConsoleTransport::new(input, Vec::new(), "console");

    let message = transport
        .next_message()
        .await
        .expect("read should succeed")
        .expect("message");
    transport
        .reply(&message, "Hi! I can help with Mapeo.")
        .await
        .expect("reply should succeed");

    assert_eq!(transport.into_writer(), b"Hi! I can help with Mapeo.\n\n");
}
