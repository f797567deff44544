//! Activation flows of the proprietary card families

use iso14b_rs::card::CardDescriptor;
use iso14b_rs::crc::{crc_b_append, crc_picopass_append};
use iso14b_rs::util::hex::hex_to_bytes;
use iso14b_rs::{Iso14bError, MockAfe, Reader, ReaderConfig};

fn framed(payload: &[u8]) -> Vec<u8> {
    let mut f = payload.to_vec();
    crc_b_append(&mut f);
    f
}

fn picopass_framed(payload: &[u8]) -> Vec<u8> {
    let mut f = payload.to_vec();
    crc_picopass_append(&mut f);
    f
}

fn connected_reader(afe: MockAfe) -> Reader<MockAfe> {
    let mut reader = Reader::new(afe, ReaderConfig::default());
    reader.field_on().unwrap();
    reader
}

#[test]
fn cts_select_reads_pc_fc_and_uid() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&framed(&[0x11, 0x22]));
    // CTS answers may die without an EOF; the UID read does here
    afe.queue_tag_frame_unterminated(&framed(&[0xCA, 0xFE, 0x00, 0x01]));

    let mut reader = connected_reader(afe);
    let card = reader.select_cts().unwrap();
    assert_eq!(
        card,
        CardDescriptor::CtsAsk {
            pc: 0x11,
            fc: 0x22,
            uid: [0xCA, 0xFE, 0x00, 0x01],
        }
    );
}

#[test]
fn xerox_select_walks_empty_slots() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&hex_to_bytes("50 82 0D E1 74 20 38 19 22 00 21 85 5E D7"));
    // slots 0..2 stay silent, slot 3 answers with the UID
    afe.queue_iq_burst(vec![]);
    afe.queue_iq_burst(vec![]);
    afe.queue_iq_burst(vec![]);
    afe.queue_tag_frame(&framed(&[8, 7, 6, 5, 4, 3, 2, 1]));

    let mut reader = connected_reader(afe);
    let card = reader.select_xerox().unwrap();
    assert_eq!(
        card,
        CardDescriptor::Xerox {
            uid: [8, 7, 6, 5, 4, 3, 2, 1],
            atqb: [0x20, 0x38, 0x19, 0x22, 0x00, 0x21, 0x85],
        }
    );
}

#[test]
fn xerox_select_exhausts_slots() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&hex_to_bytes("50 82 0D E1 74 20 38 19 22 00 21 85 5E D7"));
    // every slot stays silent

    let mut reader = connected_reader(afe);
    let before = reader.session().timeout;
    assert!(matches!(
        reader.select_xerox(),
        Err(Iso14bError::AntiCollision(_))
    ));
    // the slot-poll timeout did not leak into the session
    assert_eq!(reader.session().timeout, before);
}

#[test]
fn picopass_select_reads_header_blocks() {
    let csn = [0xE0, 0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE];
    let conf = [0x12, 0xFF, 0xFF, 0xFF, 0x7F, 0x1F, 0xFF, 0x3C];
    let epurse = [0xFF, 0xFF, 0xFF, 0xFF, 0xE3, 0xFF, 0xFF, 0xFF];
    let aia = [0xFF; 8];

    let mut afe = MockAfe::new();
    afe.queue_tag_sof_only(); // ACTALL
    afe.queue_tag_frame(&picopass_framed(&csn)); // identify
    afe.queue_tag_frame(&picopass_framed(&csn)); // select
    afe.queue_tag_frame(&picopass_framed(&conf));
    afe.queue_tag_frame(&picopass_framed(&epurse));
    afe.queue_tag_frame(&picopass_framed(&aia));

    let mut reader = connected_reader(afe);
    let card = reader.select_picopass().unwrap();
    assert_eq!(
        card,
        CardDescriptor::Picopass {
            csn,
            conf,
            app_issuer: aia,
            epurse,
        }
    );
}

#[test]
fn srx_wrong_chipid_echo_is_a_wrong_answer() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&framed(&[0x33]));
    afe.queue_tag_frame(&framed(&[0x34])); // echo mismatch

    let mut reader = connected_reader(afe);
    assert!(matches!(
        reader.select_srx(),
        Err(Iso14bError::WrongAnswer(_))
    ));
}

#[test]
fn srx_corrupt_chipid_frame_fails_on_crc_not_content() {
    let mut afe = MockAfe::new();
    let mut bad = framed(&[0x33]);
    bad[1] ^= 0x01;
    afe.queue_tag_frame(&bad);

    let mut reader = connected_reader(afe);
    assert!(matches!(reader.select_srx(), Err(Iso14bError::Crc)));
}

#[test]
fn select_without_field_fails() {
    let mut reader = Reader::new(MockAfe::new(), ReaderConfig::default());
    assert!(matches!(reader.select_std(), Err(Iso14bError::FieldOff)));
}

#[test]
fn short_atqb_is_a_length_error() {
    let mut afe = MockAfe::new();
    afe.queue_tag_frame(&framed(&[0x50, 0x82, 0x0D]));

    let mut reader = connected_reader(afe);
    assert!(matches!(
        reader.select_std(),
        Err(Iso14bError::Length { .. })
    ));
}
