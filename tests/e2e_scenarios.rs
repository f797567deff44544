//! End-to-end scenarios against the scripted mock AFE
//!
//! These drive the dispatcher and the mode engines exactly the way the host
//! would, with the card side played back by the mock front-end.

use iso14b_rs::afe::mock::encode_sniff_exchange;
use iso14b_rs::card::CardDescriptor;
use iso14b_rs::crc::{crc_b_append, crc_b_verify};
use iso14b_rs::dispatch::{run_command, CommandResponse, Iso14bFlags, RawCommand};
use iso14b_rs::timing::fwi_to_timeout_ticks;
use iso14b_rs::trace::Direction;
use iso14b_rs::util::hex::hex_to_bytes;
use iso14b_rs::{MockAfe, Reader, ReaderConfig, Simulator, SimulatorConfig, Sniffer, TagState};

fn framed(payload: &[u8]) -> Vec<u8> {
    let mut f = payload.to_vec();
    crc_b_append(&mut f);
    f
}

fn command(flags: Iso14bFlags, raw: &[u8]) -> RawCommand {
    RawCommand {
        flags,
        timeout_etu: 0,
        raw: raw.to_vec(),
    }
}

#[test]
fn e1_select_standard_card() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&hex_to_bytes("50 82 0D E1 74 20 38 19 22 00 21 85 5E D7"));
    afe.queue_tag_frame(&hex_to_bytes("00 78 F0"));

    let mut reader = Reader::new(afe, ReaderConfig::default());
    let responses = run_command(
        &mut reader,
        &command(Iso14bFlags::CONNECT | Iso14bFlags::SELECT_STD, &[]),
    )
    .unwrap();

    assert_eq!(
        responses,
        vec![CommandResponse::Card(CardDescriptor::Std14b {
            uid: [0x82, 0x0D, 0xE1, 0x74],
            atqb: [0x20, 0x38, 0x19, 0x22, 0x00, 0x21, 0x85],
            cid: 0x00,
            max_frame: 32,
            fwi: 8,
        })]
    );
    assert_eq!(reader.session().max_frame_size, 32);
    assert_eq!(reader.session().fwi, 8);
    assert_eq!(reader.session().pcb_blocknum, 0);

    // the wakeup went out with its embedded checksum, the ATTRIB was built
    // from the PUPI
    let trace = reader.trace().entries();
    assert_eq!(trace[0].direction, Direction::Reader);
    assert_eq!(trace[0].data, hex_to_bytes("05 00 00 71 FF"));
    let attrib = &trace[2].data;
    assert_eq!(attrib[0], 0x1D);
    assert_eq!(&attrib[1..5], &[0x82, 0x0D, 0xE1, 0x74]);
    assert!(crc_b_verify(attrib));
}

#[test]
fn e2_srx_select_then_raw_block_read() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&framed(&[0x33])); // chip-ID
    afe.queue_tag_frame(&framed(&[0x33])); // select echo
    afe.queue_tag_frame(&framed(&[0xD0, 0x02, 0x33, 0x01, 0x02, 0x03, 0x04, 0x05])); // UID
    afe.queue_tag_frame(&framed(&[0xDE, 0xAD, 0xBE, 0xEF])); // block 0

    let mut reader = Reader::new(afe, ReaderConfig::default());
    let responses = run_command(
        &mut reader,
        &command(
            Iso14bFlags::CONNECT | Iso14bFlags::SELECT_SR | Iso14bFlags::RAW,
            &[0x08, 0x00, 0xAB, 0xCD],
        ),
    )
    .unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(
        responses[0],
        CommandResponse::Card(CardDescriptor::SrX {
            chipid: 0x33,
            uid: [0xD0, 0x02, 0x33, 0x01, 0x02, 0x03, 0x04, 0x05],
        })
    );
    let CommandResponse::Raw(block) = &responses[1] else {
        panic!("expected raw payload");
    };
    assert_eq!(block.len(), 6);
    assert_eq!(&block[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert!(crc_b_verify(block));
}

#[test]
fn e3_apdu_with_waiting_time_extension() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&hex_to_bytes("50 82 0D E1 74 20 38 19 22 00 21 85 5E D7"));
    afe.queue_tag_frame(&hex_to_bytes("00 78 F0"));
    afe.queue_tag_frame(&framed(&[0xF2, 0x03])); // S(WTX) request
    afe.queue_tag_frame(&framed(&[0x02, 0x90, 0x00])); // real answer

    let mut reader = Reader::new(afe, ReaderConfig::default());
    let responses = run_command(
        &mut reader,
        &command(
            Iso14bFlags::CONNECT | Iso14bFlags::SELECT_STD | Iso14bFlags::APDU,
            &[0x00, 0xA4, 0x00, 0x00],
        ),
    )
    .unwrap();

    let CommandResponse::Apdu(apdu) = &responses[1] else {
        panic!("expected apdu payload");
    };
    assert_eq!(apdu.response_byte, 0x02);
    assert_eq!(apdu.data, vec![0x90, 0x00]);

    // the extension was echoed back with a fresh checksum, and the timeout
    // is back at the value the ATQB's FWI dictates
    let echoed = reader
        .trace()
        .entries()
        .iter()
        .filter(|e| e.direction == Direction::Reader)
        .any(|e| e.data == framed(&[0xF2, 0x03]));
    assert!(echoed, "S(WTX) echo missing from trace");
    assert_eq!(reader.session().timeout, fwi_to_timeout_ticks(8));
    assert_eq!(reader.session().pcb_blocknum, 1);
}

#[test]
fn e4_simulator_wupb_hltb_cycle() {
    let mut afe = MockAfe::new();
    afe.queue_reader_frame_bits(&hex_to_bytes("05 00 08 39 73"));
    afe.queue_reader_frame_bits(&framed(&[0x50, 0xAA, 0xAA, 0xAA, 0xAA]));
    afe.queue_reader_frame_bits(&hex_to_bytes("05 00 00 71 FF"));
    afe.press_button_when_drained = true;

    let mut sim = Simulator::new(afe, SimulatorConfig::default());
    sim.run().unwrap();

    // WUPB answered and moved to READY, HLTB answered and halted, the
    // trailing REQB was ignored
    assert_eq!(sim.state(), TagState::Halt);
    assert_eq!(sim.stats().atqb_sent, 1);
    assert_eq!(sim.stats().ok_sent, 1);
    assert_eq!(sim.stats().frames_ignored, 1);
}

#[test]
fn e5_sniff_one_exchange() {
    let mut afe = MockAfe::new();
    let wupb = hex_to_bytes("05 00 00 71 FF");
    let atqb = hex_to_bytes("50 82 0D E1 74 20 38 19 22 00 21 85 5E D7");
    afe.queue_iq_burst(encode_sniff_exchange(&wupb, &atqb));
    afe.press_button_when_drained = true;

    let mut sniffer = Sniffer::new(afe);
    sniffer.run().unwrap();

    let entries = sniffer.trace().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].direction, Direction::Reader);
    assert_eq!(entries[0].data, wupb);
    assert_eq!(entries[1].direction, Direction::Tag);
    assert_eq!(entries[1].data, atqb);
    // the two transfers occupy disjoint, ordered tick intervals
    assert!(entries[0].sof_tick < entries[0].eof_tick);
    assert!(entries[0].eof_tick < entries[1].sof_tick);
    assert!(entries[1].sof_tick < entries[1].eof_tick);
    assert_eq!(sniffer.stats().crc_errors, 0);
}

#[test]
fn button_press_cancels_a_pending_receive() {
    let mut afe = MockAfe::new();
    afe.press_button();
    // the transmit scheduler polls the button while waiting for its slot
    let mut reader = Reader::new(afe, ReaderConfig::default());
    let err = run_command(
        &mut reader,
        &command(Iso14bFlags::CONNECT | Iso14bFlags::SELECT_STD, &[]),
    )
    .unwrap_err();
    assert!(matches!(err, iso14b_rs::Iso14bError::Cancelled));
}

#[test]
fn tearoff_interrupts_raw_exchange() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&framed(&[0x33]));
    afe.queue_tag_frame(&framed(&[0x33]));
    afe.queue_tag_frame(&framed(&[0xD0, 0x02, 0x33, 0x01, 0x02, 0x03, 0x04, 0x05]));

    let mut reader = Reader::new(afe, ReaderConfig::default());
    run_command(
        &mut reader,
        &command(Iso14bFlags::CONNECT | Iso14bFlags::SELECT_SR, &[]),
    )
    .unwrap();

    reader.afe_mut().arm_tearoff();
    let err = run_command(
        &mut reader,
        &command(
            Iso14bFlags::RAW | Iso14bFlags::APPEND_CRC,
            &[0x08, 0x00],
        ),
    )
    .unwrap_err();
    assert!(matches!(err, iso14b_rs::Iso14bError::Tearoff));
}

#[test]
fn raw_appends_crc_of_the_selected_family() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&framed(&[0x33]));
    afe.queue_tag_frame(&framed(&[0x33]));
    afe.queue_tag_frame(&framed(&[0xD0, 0x02, 0x33, 0x01, 0x02, 0x03, 0x04, 0x05]));
    afe.queue_tag_frame(&framed(&[0x01, 0x02, 0x03, 0x04]));

    let mut reader = Reader::new(afe, ReaderConfig::default());
    run_command(
        &mut reader,
        &command(Iso14bFlags::CONNECT | Iso14bFlags::SELECT_SR, &[]),
    )
    .unwrap();
    run_command(
        &mut reader,
        &command(Iso14bFlags::RAW | Iso14bFlags::APPEND_CRC, &[0x08, 0x05]),
    )
    .unwrap();

    let sent = reader
        .trace()
        .entries()
        .iter()
        .rev()
        .find(|e| e.direction == Direction::Reader)
        .unwrap();
    assert_eq!(sent.data, framed(&[0x08, 0x05]));
}
