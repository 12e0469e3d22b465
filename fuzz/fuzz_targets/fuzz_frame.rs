#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use media_transfer::core::codec::FrameCodec;
use media_transfer::core::frame::{FrameLimits, TransferFrame};
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Small limits keep the fuzzer from chasing huge declared lengths
    let limits = FrameLimits {
        max_file_name_len: 255,
        max_payload_size: 64 * 1024,
    };

    let whole = TransferFrame::from_bytes(data, &limits);

    let mut buf = BytesMut::from(data);
    let streamed = FrameCodec::new(limits).decode_eof(&mut buf);

    // Both decoders must agree on well-formed input
    if let (Ok(a), Ok(Some(b))) = (&whole, &streamed) {
        assert_eq!(a, b);
    }
});
