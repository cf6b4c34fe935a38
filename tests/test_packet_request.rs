mod common;
use common::*;

use omnik_export::omnik::packet::{encode_request, Request, REQUEST_LEN};

#[test]
fn request_layout() {
    let bytes = Request::new(Factory::SERIAL).unwrap().bytes();
    let serial = (Factory::SERIAL as u32).to_le_bytes();

    assert_eq!(bytes.len(), REQUEST_LEN);
    assert_eq!(bytes[0..4], [0x68, 0x02, 0x40, 0x30]);
    assert_eq!(bytes[4..8], serial);
    assert_eq!(bytes[8..12], serial);
    assert_eq!(bytes[12..14], [0x01, 0x00]);
    assert_eq!(bytes[15], 0x16);
}

#[test]
fn request_is_deterministic() {
    for serial in [0x1000_0000u32, 602123456, 0x7fff_ffff, 0xffff_ffff] {
        assert_eq!(encode_request(serial).unwrap(), encode_request(serial).unwrap());
    }
    assert_ne!(encode_request(602123456).unwrap(), encode_request(602123457).unwrap());
}

#[test]
fn checksum_covers_everything_but_start_marker() {
    for serial in [0x1000_0000u32, 0x1234_5678, 602123456, 0xdead_beef, 0xffff_ffff] {
        let bytes = encode_request(serial).unwrap();
        let sum = bytes[1..14].iter().map(|b| *b as u32).sum::<u32>() % 256;
        assert_eq!(bytes[14] as u32, sum, "serial {:#x}", serial);
        assert_eq!(*bytes.last().unwrap(), 0x16);
    }
}

#[test]
fn request_checksum_matches_protocol_constant() {
    // the header and trailer alone sum to 115
    let bytes = Request::new(0x1000_0000).unwrap().bytes();
    let serial_sum = 2 * 0x10u32;
    assert_eq!(bytes[14] as u32, (115 + serial_sum) % 256);
}

#[test]
fn rejects_serials_out_of_range() {
    for serial in [0u64, 1, 0x0fff_ffff, 0x1_0000_0000, u64::MAX] {
        let err = Request::new(serial).unwrap_err();
        assert!(
            matches!(taxonomy(&err), Some(Error::InvalidInput(_))),
            "serial {} gave {:?}",
            serial,
            err
        );
    }

    let err = encode_request(42).unwrap_err();
    assert_eq!(Error::exit_code_for(&err), 2);
}
