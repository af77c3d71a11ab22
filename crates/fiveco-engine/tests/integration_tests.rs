//! Integration tests for the FiveCo legacy dissection engine
//!
//! These tests verify end-to-end behavior of the dissector including:
//! - Delivery splitting and all-or-nothing rejection
//! - Register and I2C payload decoding through the public entry point
//! - Request/answer correlation with synthetic ids
//! - Idempotent re-analysis
//! - Event emission

use fiveco_engine::{
    Correlation, CounterScope, Delivery, Dissection, Dissector, DissectorConfig, DissectorEvent,
    EngineError, FlowId,
};
use fiveco_protocol::{
    encode_frame, encode_register_write, AnnotationKind, CommandCode, DecodeNode, ParseError,
    DUPLICATE_ANSWER,
};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub const FLOW_A: FlowId = FlowId(1);
    pub const FLOW_B: FlowId = FlowId(2);

    /// Create a dissector with a specific counter scope
    pub fn dissector_with_scope(counter_scope: CounterScope) -> Dissector {
        let config = DissectorConfig {
            counter_scope,
            ..Default::default()
        };
        Dissector::with_config(config).unwrap()
    }

    /// Build a frame with a zero wire sequence, as many devices send
    pub fn frame(command: CommandCode, payload: &[u8]) -> Vec<u8> {
        encode_frame(command, 0, payload)
    }

    /// Dissect a delivery that must be accepted
    pub fn dissect(dissector: &mut Dissector, flow: FlowId, packet: u64, data: &[u8]) -> Dissection {
        dissector
            .dissect(&Delivery::new(flow, packet, data))
            .unwrap()
    }

    /// Labels of the children of the frame's Data node
    pub fn data_labels(tree: &DecodeNode) -> Vec<String> {
        tree.find("5co-legacy.data")
            .map(|data| data.children.iter().map(|c| c.label.clone()).collect())
            .unwrap_or_default()
    }

    /// Count events matching a predicate
    pub fn count_events(events: &[DissectorEvent], f: impl Fn(&DissectorEvent) -> bool) -> usize {
        events.iter().filter(|e| f(e)).count()
    }
}

// ============================================================================
// Frame Reader Tests
// ============================================================================

mod frame_reader_tests {
    use super::*;

    #[test]
    fn two_minimal_frames_in_one_delivery() {
        let mut dissector = Dissector::new();
        let mut data = helpers::frame(CommandCode::FlashAreaErase, &[]);
        data.extend(helpers::frame(CommandCode::WriteRegisterAnswer, &[]));
        assert_eq!(data.len(), 16);

        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);
        assert_eq!(result.frames.len(), 2);
        assert_eq!(result.consumed, 16);
        assert_eq!(result.frames[1].occurrence.offset, 8);
    }

    #[test]
    fn length_overrun_rejects_whole_delivery() {
        let mut dissector = Dissector::new();
        // Declares 16 payload bytes, only 1 present
        let data = [0x00, 0x21, 0x00, 0x00, 0x00, 0x10, 0x14, 0xAA, 0xBB];

        let result = dissector.dissect(&Delivery::new(helpers::FLOW_A, 1, &data));
        assert_eq!(
            result.unwrap_err(),
            EngineError::ProtocolMismatch(ParseError::LengthOverrun {
                declared: 16,
                available: 1
            })
        );
    }

    #[test]
    fn bad_trailing_frame_leaves_no_state() {
        let mut dissector = Dissector::new();
        let mut data = helpers::frame(CommandCode::ReadRegister, &[0x14]);
        data.extend_from_slice(&[0x00, 0x23, 0x00, 0x00, 0x00, 0x05, 0x14]);

        assert!(dissector
            .dissect(&Delivery::new(helpers::FLOW_A, 1, &data))
            .is_err());

        // The valid leading request was not recorded
        assert_eq!(dissector.correlator().pending_count(), 0);
        assert_eq!(dissector.correlator().current_id(helpers::FLOW_A), 0);

        let events = dissector.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DissectorEvent::DeliveryRejected { packet: 1, .. }));
    }

    #[test]
    fn unknown_command_rejected() {
        let mut dissector = Dissector::new();
        let data = [0x00, 0x26, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF];
        assert_eq!(
            dissector
                .dissect(&Delivery::new(helpers::FLOW_A, 1, &data))
                .unwrap_err(),
            EngineError::ProtocolMismatch(ParseError::UnknownCommand(0x0026))
        );
    }

    #[test]
    fn empty_delivery_rejected() {
        let mut dissector = Dissector::new();
        assert!(dissector
            .dissect(&Delivery::new(helpers::FLOW_A, 1, &[]))
            .is_err());
    }
}

// ============================================================================
// Payload Decoding Tests
// ============================================================================

mod decoding_tests {
    use super::*;

    #[test]
    fn register_read_continues_past_unknown_address() {
        let mut dissector = Dissector::new();
        let data = helpers::frame(CommandCode::ReadRegister, &[0x00, 0x99, 0x01]);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);

        let tree = result.frames[0].tree();
        assert_eq!(
            helpers::data_labels(tree),
            [
                "Read Register Type/Model (0x00)",
                "Read Register unknown (0x99)",
                "Read Register Version (0x01)"
            ]
        );
        assert!(tree.has_annotation(AnnotationKind::UnknownRegister));
    }

    #[test]
    fn register_write_stops_at_unknown_address() {
        let mut dissector = Dissector::new();
        let data = helpers::frame(CommandCode::WriteRegister, &[0x14, 0x05, 0x99, 0xFF]);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);

        let tree = result.frames[0].tree();
        let children = &tree.find("5co-legacy.data").unwrap().children;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].label, "Register TCP Timeout: 5 secondes");
        assert_eq!(children[1].field, "5co-legacy.regreaduk");
        // Exactly the bytes [0x99, 0xFF]
        assert_eq!(&data[children[1].range.clone()], &[0x99, 0xFF]);
    }

    #[test]
    fn register_write_with_short_value_is_not_formatted() {
        let mut dissector = Dissector::new();
        let data = helpers::frame(CommandCode::WriteRegister, &[0x12, 0xC0, 0xA8]);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);

        let tree = result.frames[0].tree();
        assert!(tree.find("5co-legacy.RegIPAdd").is_none());
        let children = &tree.find("5co-legacy.data").unwrap().children;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].field, "5co-legacy.regreaduk");
        assert_eq!(&data[children[0].range.clone()], &[0x12, 0xC0, 0xA8]);
        assert!(tree.has_annotation(AnnotationKind::Malformed));
    }

    #[test]
    fn text_register_uses_configured_limit() {
        let config = DissectorConfig {
            text_display_limit: 4,
            ..Default::default()
        };
        let mut dissector = Dissector::with_config(config).unwrap();
        let payload = encode_register_write(&[(0x15, &b"FMod-TCP BOX\0\0\0\0"[..])]);
        let data = helpers::frame(CommandCode::WriteRegisterQuiet, &payload);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);

        assert_eq!(
            helpers::data_labels(result.frames[0].tree()),
            ["Register Module name: FMod"]
        );
    }

    #[test]
    fn empty_only_command_with_payload_flagged() {
        let mut dissector = Dissector::new();
        let data = helpers::frame(CommandCode::FlashAreaErase, &[0x01, 0x02]);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);

        let tree = result.frames[0].tree();
        assert!(tree.has_annotation(AnnotationKind::UnexpectedPayload));
        // Decoding continued up to the checksum
        assert!(tree.find("5co-legacy.checksum").is_some());
    }

    #[test]
    fn bad_checksum_is_not_fatal() {
        let mut dissector = Dissector::new();
        let mut data = helpers::frame(CommandCode::ReadRegister, &[0x14]);
        let last = data.len() - 1;
        data[last] = data[last].wrapping_add(1);
        data.extend(helpers::frame(CommandCode::ReadRegister, &[0x15]));

        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);
        assert_eq!(result.frames.len(), 2);
        assert!(!result.frames[0].checksum_ok);
        assert!(result.frames[1].checksum_ok);
        assert_eq!(
            result.info(),
            "Read register ID=0 Len=1 [BAD CHECKSUM !!], Read register ID=0 Len=1"
        );
        assert_eq!(
            helpers::data_labels(result.frames[0].tree()),
            ["Read Register TCP Timeout (0x14)"]
        );
    }
}

// ============================================================================
// Correlation Tests
// ============================================================================

mod correlation_tests {
    use super::*;

    #[test]
    fn register_read_answer_decoded_with_request() {
        let mut dissector = Dissector::new();
        let request = helpers::frame(CommandCode::ReadRegister, &[0x14]);
        let answer = helpers::frame(CommandCode::ReadRegisterAnswer, &[0x14, 0x2D]);

        helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &request);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 2, &answer);

        let frame = &result.frames[0];
        assert!(matches!(frame.correlation, Correlation::Matched { .. }));
        assert_eq!(frame.synthetic_id, 1);
        let labels = helpers::data_labels(frame.tree());
        assert_eq!(labels.len(), 1);
        assert!(labels[0].contains("TCP Timeout: 45 secondes"));
    }

    #[test]
    fn wire_sequence_is_ignored() {
        let mut dissector = Dissector::new();
        let request = encode_frame(CommandCode::ReadRegister, 41, &[0x14]);
        let answer = encode_frame(CommandCode::ReadRegisterAnswer, 7, &[0x14, 0x2D]);

        helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &request);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 2, &answer);
        assert!(matches!(
            result.frames[0].correlation,
            Correlation::Matched { .. }
        ));
    }

    #[test]
    fn request_and_answer_in_one_delivery() {
        let mut dissector = Dissector::new();
        let mut data = helpers::frame(CommandCode::ReadRegister, &[0x14]);
        data.extend(helpers::frame(CommandCode::ReadRegisterAnswer, &[0x14, 0x00]));

        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);
        assert!(matches!(
            result.frames[1].correlation,
            Correlation::Matched { .. }
        ));
        assert_eq!(
            helpers::data_labels(result.frames[1].tree()),
            ["Register TCP Timeout: Disabled"]
        );
    }

    #[test]
    fn unmatched_answer_depends_on_product() {
        let mut dissector = Dissector::new();
        let answer = helpers::frame(CommandCode::ReadRegisterAnswer, &[0x14, 0x2D]);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &answer);

        let frame = &result.frames[0];
        assert_eq!(frame.correlation, Correlation::Unmatched);
        let data = frame.tree().find("5co-legacy.data").unwrap();
        assert_eq!(
            data.value.as_deref(),
            Some("(Interpretation depends on product type)")
        );
        assert!(data.has_annotation(AnnotationKind::CorrelationMiss));
    }

    #[test]
    fn duplicate_answer_warned_and_not_decoded() {
        let mut dissector = Dissector::new();
        helpers::dissect(
            &mut dissector,
            helpers::FLOW_A,
            1,
            &helpers::frame(CommandCode::ReadRegister, &[0x14]),
        );
        let answer = helpers::frame(CommandCode::ReadRegisterAnswer, &[0x14, 0x2D]);
        helpers::dissect(&mut dissector, helpers::FLOW_A, 2, &answer);
        dissector.drain_events();

        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 3, &answer);
        let frame = &result.frames[0];
        assert!(matches!(frame.correlation, Correlation::AlreadyReplied { .. }));

        let data = frame.tree().find("5co-legacy.data").unwrap();
        assert!(data.children.is_empty());
        assert_eq!(data.value.as_deref(), Some(DUPLICATE_ANSWER));
        assert!(frame.tree().has_annotation(AnnotationKind::DuplicateAnswer));

        let events = dissector.drain_events();
        assert_eq!(
            helpers::count_events(&events, |e| matches!(e, DissectorEvent::DuplicateAnswer { .. })),
            1
        );
    }

    #[test]
    fn i2c_read_answer_replays_request() {
        let mut dissector = Dissector::new();
        let request = helpers::frame(CommandCode::I2cRead, &[0x50, 0x01, 0x10, 0x02]);
        let answer = helpers::frame(CommandCode::I2cReadAnswer, &[0xAB, 0xCD]);

        helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &request);
        let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 2, &answer);

        let read = result.frames[0].tree().find("5co-legacy.i2cread").unwrap();
        assert_eq!(
            read.text(),
            "I2C bytes read: from address 80 (1 bytes written) : 0xAB 0xCD "
        );
        assert_eq!(read.range, 6..8);
    }

    #[test]
    fn i2c_scan_exchange() {
        let mut dissector = Dissector::new();
        helpers::dissect(
            &mut dissector,
            helpers::FLOW_A,
            1,
            &helpers::frame(CommandCode::I2cScan, &[0x20, 0x21]),
        );
        let result = helpers::dissect(
            &mut dissector,
            helpers::FLOW_A,
            2,
            &helpers::frame(CommandCode::I2cScanAnswer, &[0x21]),
        );

        let frame = &result.frames[0];
        assert!(matches!(frame.correlation, Correlation::Matched { .. }));
        assert_eq!(
            frame.tree().find("5co-legacy.i2cscaned").unwrap().text(),
            "I2C addresses present: 0x21 "
        );

        // The address list does not depend on the request, so a repeated
        // answer is still shown, with the duplicate warning
        let again = helpers::dissect(
            &mut dissector,
            helpers::FLOW_A,
            3,
            &helpers::frame(CommandCode::I2cScanAnswer, &[0x21]),
        );
        let frame = &again.frames[0];
        assert!(matches!(frame.correlation, Correlation::AlreadyReplied { .. }));
        assert!(frame.tree().has_annotation(AnnotationKind::DuplicateAnswer));
        assert_eq!(
            frame.tree().find("5co-legacy.i2cscaned").unwrap().text(),
            "I2C addresses present: 0x21 "
        );
    }

    #[test]
    fn session_counter_is_shared_between_flows() {
        let mut dissector = helpers::dissector_with_scope(CounterScope::Session);
        let request = helpers::frame(CommandCode::ReadRegister, &[0x14]);
        let answer = helpers::frame(CommandCode::ReadRegisterAnswer, &[0x14, 0x2D]);

        helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &request);
        helpers::dissect(&mut dissector, helpers::FLOW_B, 2, &request);
        let a = helpers::dissect(&mut dissector, helpers::FLOW_A, 3, &answer);
        let b = helpers::dissect(&mut dissector, helpers::FLOW_B, 4, &answer);

        // Flow B's request advanced the counter under flow A's feet
        assert_eq!(a.frames[0].correlation, Correlation::Unmatched);
        assert!(matches!(b.frames[0].correlation, Correlation::Matched { .. }));
    }

    #[test]
    fn per_flow_counter_keeps_flows_apart() {
        let mut dissector = helpers::dissector_with_scope(CounterScope::PerFlow);
        let request = helpers::frame(CommandCode::ReadRegister, &[0x14]);
        let answer = helpers::frame(CommandCode::ReadRegisterAnswer, &[0x14, 0x2D]);

        helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &request);
        helpers::dissect(&mut dissector, helpers::FLOW_B, 2, &request);
        let a = helpers::dissect(&mut dissector, helpers::FLOW_A, 3, &answer);
        let b = helpers::dissect(&mut dissector, helpers::FLOW_B, 4, &answer);

        assert!(matches!(a.frames[0].correlation, Correlation::Matched { .. }));
        assert!(matches!(b.frames[0].correlation, Correlation::Matched { .. }));
        assert_eq!(a.frames[0].synthetic_id, 1);
        assert_eq!(b.frames[0].synthetic_id, 1);
    }

    #[test]
    fn reset_session_forgets_requests() {
        let mut dissector = Dissector::new();
        helpers::dissect(
            &mut dissector,
            helpers::FLOW_A,
            1,
            &helpers::frame(CommandCode::ReadRegister, &[0x14]),
        );
        dissector.reset_session();

        let result = helpers::dissect(
            &mut dissector,
            helpers::FLOW_A,
            2,
            &helpers::frame(CommandCode::ReadRegisterAnswer, &[0x14, 0x2D]),
        );
        assert_eq!(result.frames[0].correlation, Correlation::Unmatched);
        assert_eq!(result.frames[0].synthetic_id, 0);
    }
}

// ============================================================================
// Re-analysis Tests
// ============================================================================

mod reanalysis_tests {
    use super::*;

    fn capture() -> Vec<(FlowId, u64, Vec<u8>)> {
        vec![
            (helpers::FLOW_A, 1, helpers::frame(CommandCode::ReadRegister, &[0x00, 0x14])),
            (
                helpers::FLOW_A,
                2,
                helpers::frame(
                    CommandCode::ReadRegisterAnswer,
                    &[0x00, 0x00, 0x12, 0x00, 0x03, 0x14, 0x2D],
                ),
            ),
            (helpers::FLOW_A, 3, helpers::frame(CommandCode::WriteRegister, &[0x14, 0x3C])),
            (helpers::FLOW_A, 4, helpers::frame(CommandCode::WriteRegisterAnswer, &[])),
        ]
    }

    #[test]
    fn second_pass_is_identical() {
        let mut dissector = Dissector::new();
        let capture = capture();

        let first: Vec<_> = capture
            .iter()
            .map(|(flow, packet, data)| helpers::dissect(&mut dissector, *flow, *packet, data))
            .collect();
        let second: Vec<_> = capture
            .iter()
            .map(|(flow, packet, data)| helpers::dissect(&mut dissector, *flow, *packet, data))
            .collect();

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.frames[0].synthetic_id, b.frames[0].synthetic_id);
            assert_eq!(a.frames[0].correlation, b.frames[0].correlation);
            assert_eq!(a.frames[0].annotated, b.frames[0].annotated);
        }
        assert!(!second
            .iter()
            .any(|d| d.frames[0].tree().has_annotation(AnnotationKind::DuplicateAnswer)));
        assert_eq!(dissector.correlator().current_id(helpers::FLOW_A), 2);
        assert_eq!(dissector.correlator().pending_count(), 2);
    }

    #[test]
    fn packet_number_reused_on_other_flow_is_a_new_occurrence() {
        let mut dissector = Dissector::new();
        helpers::dissect(
            &mut dissector,
            helpers::FLOW_A,
            1,
            &helpers::frame(CommandCode::ReadRegister, &[0x14]),
        );

        let answer = helpers::dissect(
            &mut dissector,
            helpers::FLOW_B,
            1,
            &helpers::frame(CommandCode::I2cReadAnswer, &[0x01]),
        );
        let frame = &answer.frames[0];
        assert_eq!(frame.correlation, Correlation::Unmatched);
        assert_eq!(frame.occurrence.flow, helpers::FLOW_B);
        assert!(frame.tree().has_annotation(AnnotationKind::CorrelationMiss));

        let events = dissector.drain_events();
        assert_eq!(
            helpers::count_events(&events, |e| matches!(e, DissectorEvent::FrameDecoded { replay: true, .. })),
            0
        );
        assert_eq!(
            helpers::count_events(&events, |e| matches!(e, DissectorEvent::UnmatchedAnswer { .. })),
            1
        );
    }

    #[test]
    fn replay_emits_no_correlation_events() {
        let mut dissector = Dissector::new();
        let capture = capture();
        for (flow, packet, data) in &capture {
            helpers::dissect(&mut dissector, *flow, *packet, data);
        }
        let first = dissector.drain_events();
        assert_eq!(
            helpers::count_events(&first, |e| matches!(e, DissectorEvent::AnswerMatched { .. })),
            2
        );

        for (flow, packet, data) in &capture {
            helpers::dissect(&mut dissector, *flow, *packet, data);
        }
        let second = dissector.drain_events();
        assert_eq!(
            helpers::count_events(&second, |e| matches!(e, DissectorEvent::AnswerMatched { .. })),
            0
        );
        assert_eq!(
            helpers::count_events(
                &second,
                |e| matches!(e, DissectorEvent::FrameDecoded { replay: true, .. })
            ),
            4
        );
    }
}

// ============================================================================
// Event Tests
// ============================================================================

mod event_tests {
    use super::*;

    #[test]
    fn checksum_mismatch_event() {
        let mut dissector = Dissector::new();
        let mut data = helpers::frame(CommandCode::FlashAreaErase, &[]);
        data[6] ^= 0x10;

        helpers::dissect(&mut dissector, helpers::FLOW_A, 9, &data);
        let events = dissector.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            DissectorEvent::ChecksumMismatch { occurrence, .. } if occurrence.packet == 9
        )));
    }

    #[test]
    fn unmatched_answer_event() {
        let mut dissector = Dissector::new();
        helpers::dissect(
            &mut dissector,
            helpers::FLOW_B,
            1,
            &helpers::frame(CommandCode::I2cWriteAnswer, &[]),
        );
        let events = dissector.drain_events();
        assert!(events.contains(&DissectorEvent::UnmatchedAnswer {
            flow: helpers::FLOW_B,
            command: CommandCode::I2cWriteAnswer,
            synthetic_id: 0,
        }));
    }

    #[test]
    fn reset_event() {
        let mut dissector = Dissector::new();
        dissector.reset_session();
        assert_eq!(dissector.drain_events(), vec![DissectorEvent::SessionReset]);
        assert!(dissector.drain_events().is_empty());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use fiveco_protocol::payload::parse_register_writes;
    use fiveco_protocol::RegisterCatalog;
    use proptest::prelude::*;

    /// Checksum computed word by word, independent of the library
    fn reference_checksum(bytes: &[u8]) -> u16 {
        let mut sum: u32 = 0;
        for pair in bytes.chunks(2) {
            let high = !pair[0] as u32;
            let low = !pair.get(1).copied().unwrap_or(0) as u32;
            sum += (high << 8) | low;
        }
        let folded = (sum >> 16) + (sum & 0xFFFF);
        ((folded >> 16) + (folded & 0xFFFF)) as u16
    }

    fn command() -> impl Strategy<Value = CommandCode> {
        prop::sample::select(CommandCode::ALL.to_vec())
    }

    fn register_entry() -> impl Strategy<Value = (u8, Vec<u8>)> {
        (0x00u8..=0x15).prop_flat_map(|address| {
            let size = RegisterCatalog::lookup(address).map_or(0, |def| def.size);
            (Just(address), prop::collection::vec(any::<u8>(), size))
        })
    }

    proptest! {
        #[test]
        fn checksum_verdict_matches_recomputation(
            command in command(),
            sequence in any::<u16>(),
            payload in prop::collection::vec(any::<u8>(), 0..64),
            corrupt in any::<bool>(),
        ) {
            let mut data = encode_frame(command, sequence, &payload);
            let body_len = data.len() - 2;
            if corrupt {
                data[body_len] ^= 0x5A;
            }
            let trailer = u16::from_be_bytes([data[body_len], data[body_len + 1]]);
            let expected = reference_checksum(&data[..body_len]) == trailer;

            let mut dissector = Dissector::new();
            let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);
            prop_assert_eq!(result.frames[0].checksum_ok, expected);
            prop_assert_eq!(expected, !corrupt);
        }

        #[test]
        fn register_write_round_trip(entries in prop::collection::vec(register_entry(), 1..8)) {
            let refs: Vec<(u8, &[u8])> = entries
                .iter()
                .map(|(address, value)| (*address, value.as_slice()))
                .collect();
            let payload = encode_register_write(&refs);

            let (values, stop) = parse_register_writes(&payload);
            prop_assert!(stop.is_none());
            let decoded: Vec<(u8, Vec<u8>)> = values
                .iter()
                .map(|v| (v.address(), v.value.clone()))
                .collect();
            prop_assert_eq!(&decoded, &entries);

            let mut dissector = Dissector::new();
            let data = helpers::frame(CommandCode::WriteRegister, &payload);
            let result = helpers::dissect(&mut dissector, helpers::FLOW_A, 1, &data);
            let labels = helpers::data_labels(result.frames[0].tree());
            prop_assert_eq!(labels.len(), entries.len());
        }

        #[test]
        fn reanalysis_is_idempotent(
            frames in prop::collection::vec(
                (command(), prop::collection::vec(any::<u8>(), 0..12), any::<bool>()),
                1..16
            )
        ) {
            let deliveries: Vec<(FlowId, u64, Vec<u8>)> = frames
                .iter()
                .enumerate()
                .map(|(i, (command, payload, second_flow))| {
                    let flow = if *second_flow { helpers::FLOW_B } else { helpers::FLOW_A };
                    (flow, i as u64, helpers::frame(*command, payload))
                })
                .collect();

            let mut dissector = Dissector::new();
            let mut passes = Vec::new();
            for _ in 0..2 {
                let pass: Vec<_> = deliveries
                    .iter()
                    .map(|(flow, packet, data)| helpers::dissect(&mut dissector, *flow, *packet, data))
                    .collect();
                passes.push(pass);
            }

            for (a, b) in passes[0].iter().zip(&passes[1]) {
                prop_assert_eq!(a.frames[0].synthetic_id, b.frames[0].synthetic_id);
                prop_assert_eq!(a.frames[0].correlation, b.frames[0].correlation);
                prop_assert_eq!(&a.frames[0].annotated, &b.frames[0].annotated);
            }
        }
    }
}
