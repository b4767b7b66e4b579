// Copyright 2020 - developers of the `tlgram` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use tlgram_tl_gen::{generate_rust_code, Config, Outputs};
use tlgram_tl_parser::parse_tl_file;
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

const CURRENT_VERSION: i32 = 1;

fn main() -> std::io::Result<()> {
    let out_dir = env::var("OUT_DIR").unwrap();
    let out_dir = Path::new(&out_dir);

    let mut outputs = Outputs {
        common: BufWriter::new(File::create(out_dir.join("generated.rs"))?),
        types: BufWriter::new(File::create(out_dir.join("generated_types.rs"))?),
        functions: BufWriter::new(File::create(out_dir.join("generated_functions.rs"))?),
        enums: BufWriter::new(File::create(out_dir.join("generated_enums.rs"))?),
    };

    // This is `tlgram-secret`'s own private wire format for the payload
    // carried inside an encrypted message, i.e. what `EncryptedMessage.bytes`
    // contains once decrypted. It never travels the MTProto transport on its
    // own and has no relation to `api.tl`'s constructor identifiers.
    let definitions = parse_tl_file(
        r#"
        decryptedMessage random_id:long ttl:int message:string = DecryptedMessage;
        decryptedMessageService random_id:long action:DecryptedMessageAction = DecryptedMessage;

        decryptedMessageActionSetTtl ttl_seconds:int = DecryptedMessageAction;
        decryptedMessageActionReadMessages random_ids:Vector<long> = DecryptedMessageAction;
        decryptedMessageActionDeleteMessages random_ids:Vector<long> = DecryptedMessageAction;
        decryptedMessageActionFlushHistory = DecryptedMessageAction;
        decryptedMessageActionNotifyLayer layer:int = DecryptedMessageAction;
        decryptedMessageActionTyping = DecryptedMessageAction;
        decryptedMessageActionResend start_seq_no:int end_seq_no:int = DecryptedMessageAction;
        decryptedMessageActionNoop = DecryptedMessageAction;
        decryptedMessageActionRequestKey exchange_id:long g_a:bytes = DecryptedMessageAction;
        decryptedMessageActionAcceptKey exchange_id:long g_b:bytes key_fingerprint:long = DecryptedMessageAction;
        decryptedMessageActionCommitKey exchange_id:long key_fingerprint:long = DecryptedMessageAction;
        decryptedMessageActionAbortKey exchange_id:long = DecryptedMessageAction;

        decryptedMessageLayer random_bytes:bytes layer:int in_seq_no:int out_seq_no:int message:DecryptedMessage = DecryptedMessageLayer;
        "#,
    )
    .map(Result::unwrap)
    .collect::<Vec<_>>();

    let config = Config {
        ..Default::default()
    };

    generate_rust_code(&mut outputs, &definitions, CURRENT_VERSION, &config)?;
    outputs.flush()?;

    Ok(())
}
