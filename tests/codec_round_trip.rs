//! Generated checks for the frame codec and assembler.
//!
//! Every catalogued identifier pair must survive encode then decode with its
//! session, result code and payload intact, however the bytes are chunked on
//! the way in.

use std::sync::Arc;

use altcom::{
    CommandCatalog,
    CommandId,
    CommandKind,
    Frame,
    FrameCodec,
    ResponseFrame,
    SessionHandle,
    codec::{CommandFrame, CommandHeader, ResponseHeader},
    frame::FrameAssembler,
};
use bytes::Bytes;
use proptest::{
    prelude::*,
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestCaseError, TestRng, TestRunner},
};
use rstest::rstest;

const MAX_PAYLOAD: usize = 256;

fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

fn catalogued() -> Vec<(CommandId, CommandKind)> {
    let mut pairs: Vec<_> = CommandCatalog::standard().iter().collect();
    pairs.sort_by_key(|(id, _)| *id);
    pairs
}

fn frame_strategy() -> impl Strategy<Value = Frame> {
    let pairs = catalogued();
    (
        0..pairs.len(),
        any::<u32>(),
        any::<i32>(),
        any::<bool>(),
        proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD),
    )
        .prop_map(move |(index, session, result, as_command, payload)| {
            let (command, kind) = pairs[index];
            let session = SessionHandle::new(session);
            let payload = Bytes::from(payload);
            if as_command && kind == CommandKind::Call {
                Frame::Command(CommandFrame {
                    header: CommandHeader { command, session },
                    payload,
                })
            } else {
                Frame::Response(ResponseFrame {
                    header: ResponseHeader {
                        command,
                        session,
                        result,
                    },
                    payload,
                })
            }
        })
}

#[test]
fn standard_catalogue_keeps_calls_and_events_disjoint() {
    let pairs = catalogued();
    assert!(pairs.iter().any(|(_, kind)| *kind == CommandKind::Event));
    for (id, kind) in &pairs {
        let duplicates = pairs.iter().filter(|(other, _)| other == id).count();
        assert_eq!(duplicates, 1, "{id} is catalogued as more than one kind");
        assert_eq!(CommandCatalog::standard().kind(*id), Some(*kind));
    }
}

#[rstest]
#[case(128)]
#[case(256)]
fn generated_frames_round_trip(#[case] cases: u32) {
    let catalog = CommandCatalog::standard();
    let codec = FrameCodec::new(MAX_PAYLOAD);
    deterministic_runner(cases)
        .run(&frame_strategy(), |frame| {
            let bytes = codec
                .encode(&frame)
                .map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?;
            let decoded = codec
                .decode(&bytes, &catalog)
                .map_err(|err| TestCaseError::fail(format!("decode failed: {err}")))?;
            prop_assert_eq!(decoded, frame);
            Ok(())
        })
        .expect("generated frames should round-trip");
}

#[rstest]
#[case(96)]
fn generated_streams_reassemble_across_chunks(#[case] cases: u32) {
    let catalog = Arc::new(CommandCatalog::standard());
    let codec = FrameCodec::new(MAX_PAYLOAD);
    let strategy = (
        proptest::collection::vec(frame_strategy(), 1..8),
        1usize..64,
    );
    deterministic_runner(cases)
        .run(&strategy, |(frames, chunk)| {
            let mut wire = Vec::new();
            for frame in &frames {
                let bytes = codec
                    .encode(frame)
                    .map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?;
                wire.extend_from_slice(&bytes);
            }

            let mut assembler = FrameAssembler::new(codec, Arc::clone(&catalog));
            let mut decoded = Vec::new();
            for piece in wire.chunks(chunk) {
                assembler.push(piece);
                while let Some(next) = assembler.next_frame() {
                    decoded.push(
                        next.map_err(|err| TestCaseError::fail(format!("decode failed: {err}")))?,
                    );
                }
            }
            prop_assert_eq!(decoded, frames);
            prop_assert_eq!(assembler.buffered(), 0);
            Ok(())
        })
        .expect("chunked streams should reassemble");
}

#[rstest]
#[case(128)]
fn truncated_frames_never_decode(#[case] cases: u32) {
    let catalog = CommandCatalog::standard();
    let codec = FrameCodec::new(MAX_PAYLOAD);
    deterministic_runner(cases)
        .run(&(frame_strategy(), any::<prop::sample::Index>()), |(frame, cut)| {
            let bytes = codec
                .encode(&frame)
                .map_err(|err| TestCaseError::fail(format!("encode failed: {err}")))?;
            let cut = cut.index(bytes.len());
            prop_assert!(codec.decode(&bytes[..cut], &catalog).is_err());
            Ok(())
        })
        .expect("truncated frames should be rejected");
}
