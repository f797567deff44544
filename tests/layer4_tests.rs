//! Layer-4 block-number and waiting-time-extension behaviour

use iso14b_rs::crc::crc_b_append;
use iso14b_rs::dispatch::{run_command, Iso14bFlags, RawCommand};
use iso14b_rs::util::hex::hex_to_bytes;
use iso14b_rs::{MockAfe, Reader, ReaderConfig};

fn framed(payload: &[u8]) -> Vec<u8> {
    let mut f = payload.to_vec();
    crc_b_append(&mut f);
    f
}

/// Reader with a standard card already selected (block number 0)
fn selected_reader(mut afe: MockAfe) -> Reader<MockAfe> {
    afe.queue_tag_frame(&hex_to_bytes("50 82 0D E1 74 20 38 19 22 00 21 85 5E D7"));
    afe.queue_tag_frame(&hex_to_bytes("00 78 F0"));
    let mut reader = Reader::new(afe, ReaderConfig::default());
    run_command(
        &mut reader,
        &RawCommand {
            flags: Iso14bFlags::CONNECT | Iso14bFlags::SELECT_STD,
            timeout_etu: 0,
            raw: vec![],
        },
    )
    .unwrap();
    assert_eq!(reader.session().pcb_blocknum, 0);
    reader
}

#[test]
fn i_block_with_matching_number_toggles() {
    let mut reader = selected_reader(MockAfe::new());
    reader.afe_mut().queue_tag_frame(&framed(&[0x00, 0x90, 0x00]));
    reader.apdu(&[0x00, 0xB0, 0x00, 0x00], false).unwrap();
    assert_eq!(reader.session().pcb_blocknum, 1);
}

#[test]
fn r_ack_with_matching_number_toggles_back() {
    let mut reader = selected_reader(MockAfe::new());
    // first exchange takes the block number to 1
    reader.afe_mut().queue_tag_frame(&framed(&[0x02, 0x90, 0x00]));
    reader.apdu(&[0x00, 0xB0, 0x00, 0x00], false).unwrap();
    assert_eq!(reader.session().pcb_blocknum, 1);
    // R(ACK) carrying block number 1
    reader.afe_mut().queue_tag_frame(&framed(&[0xA3]));
    reader.apdu(&[0x00, 0xB0, 0x00, 0x01], false).unwrap();
    assert_eq!(reader.session().pcb_blocknum, 0);
}

#[test]
fn i_block_with_other_number_does_not_toggle() {
    let mut reader = selected_reader(MockAfe::new());
    // response block number 1 while ours is 0
    reader.afe_mut().queue_tag_frame(&framed(&[0x03, 0x90, 0x00]));
    reader.apdu(&[0x00, 0xB0, 0x00, 0x00], false).unwrap();
    assert_eq!(reader.session().pcb_blocknum, 0);
}

#[test]
fn s_block_does_not_toggle() {
    let mut reader = selected_reader(MockAfe::new());
    // S(DESELECT) response style PCB (0xC2): neither I-block nor R(ACK)
    reader.afe_mut().queue_tag_frame(&framed(&[0xC2]));
    reader.apdu(&[0x00], false).unwrap();
    assert_eq!(reader.session().pcb_blocknum, 0);
}

#[test]
fn chaining_bit_is_set_on_request() {
    let mut reader = selected_reader(MockAfe::new());
    reader.afe_mut().queue_tag_frame(&framed(&[0x02, 0x90, 0x00]));
    reader.apdu(&[0x00, 0xA4], true).unwrap();
    let sent = reader.trace().entries().iter().rev().find(|e| {
        e.direction == iso14b_rs::Direction::Reader
    });
    assert_eq!(sent.unwrap().data[0], 0x12); // I-block, chaining, block 0
}

#[test]
fn wtx_of_five_multiplies_and_restores() {
    let mut reader = selected_reader(MockAfe::new());
    let before = reader.session().timeout;
    reader.afe_mut().queue_tag_frame(&framed(&[0xF2, 0x05]));
    reader.afe_mut().queue_tag_frame(&framed(&[0x02, 0x6F, 0x00]));
    let resp = reader.apdu(&[0x00, 0xA4, 0x00, 0x00], false).unwrap();
    assert_eq!(resp.data, vec![0x6F, 0x00]);
    assert_eq!(reader.session().timeout, before);
    // the echo carried the same wtxm with a fresh checksum
    let echoed = reader
        .trace()
        .entries()
        .iter()
        .any(|e| e.direction == iso14b_rs::Direction::Reader && e.data == framed(&[0xF2, 0x05]));
    assert!(echoed);
}

#[test]
fn repeated_wtx_requests_are_all_answered() {
    let mut reader = selected_reader(MockAfe::new());
    reader.afe_mut().queue_tag_frame(&framed(&[0xF2, 0x01]));
    reader.afe_mut().queue_tag_frame(&framed(&[0xF2, 0x3B]));
    reader.afe_mut().queue_tag_frame(&framed(&[0x02, 0x90, 0x00]));
    let resp = reader.apdu(&[0x00, 0xA4, 0x00, 0x00], false).unwrap();
    assert_eq!(resp.response_byte, 0x02);
    assert_eq!(reader.session().timeout, iso14b_rs::timing::fwi_to_timeout_ticks(8));
}

#[test]
fn corrupt_layer4_answer_is_a_crc_error() {
    let mut reader = selected_reader(MockAfe::new());
    let mut bad = framed(&[0x02, 0x90, 0x00]);
    let len = bad.len();
    bad[len - 1] ^= 0xFF;
    reader.afe_mut().queue_tag_frame(&bad);
    assert!(matches!(
        reader.apdu(&[0x00, 0xA4, 0x00, 0x00], false),
        Err(iso14b_rs::Iso14bError::Crc)
    ));
}
