//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Framed stream tests for the line codec

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use tokio_util::codec::{FramedRead, FramedWrite};
use varidial_linecodec::{InputEvent, LineCodec, Negotiation, OutputFrame, consts};

#[tokio::test]
async fn test_framed_read_yields_lines() {
    let (mut client, server) = duplex(1024);
    let mut reader = FramedRead::new(server, LineCodec::new());

    client.write_all(b"1234\r\nsecret\r\n/q\r\n").await.unwrap();
    drop(client);

    let mut lines = Vec::new();
    while let Some(event) = reader.next().await {
        lines.push(event.unwrap());
    }
    assert_eq!(
        lines,
        vec![
            InputEvent::Line("1234".into()),
            InputEvent::Line("secret".into()),
            InputEvent::Line("/q".into()),
        ]
    );
}

#[tokio::test]
async fn test_framed_read_handles_byte_at_a_time_input() {
    let (mut client, server) = duplex(1024);
    let mut reader = FramedRead::new(server, LineCodec::new());

    let writer = tokio::spawn(async move {
        for byte in [consts::IAC, consts::WILL, 31, b'h', b'i', b'\r', b'\n'] {
            client.write_all(&[byte]).await.unwrap();
            client.flush().await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    assert_eq!(
        reader.next().await.unwrap().unwrap(),
        InputEvent::Negotiate(Negotiation::Will, 31)
    );
    assert_eq!(
        reader.next().await.unwrap().unwrap(),
        InputEvent::Line("hi".into())
    );
    writer.await.unwrap();
}

#[tokio::test]
async fn test_unterminated_line_delivered_at_eof() {
    let (mut client, server) = duplex(1024);
    let mut reader = FramedRead::new(server, LineCodec::new());

    client.write_all(b"bye").await.unwrap();
    drop(client);

    assert_eq!(
        reader.next().await.unwrap().unwrap(),
        InputEvent::Line("bye".into())
    );
    assert!(reader.next().await.is_none());
}

#[tokio::test]
async fn test_framed_write_output() {
    let (client, server) = duplex(1024);
    let mut writer = FramedWrite::new(server, LineCodec::new());

    writer.send(OutputFrame::prompt("Enter your number: ")).await.unwrap();
    writer.send(OutputFrame::line("/? for help")).await.unwrap();
    writer
        .send(OutputFrame::Negotiate(Negotiation::Dont, 24))
        .await
        .unwrap();
    drop(writer);

    let mut received = Vec::new();
    let mut client = client;
    client.read_to_end(&mut received).await.unwrap();

    let mut expected = b"Enter your number: /? for help\r\n".to_vec();
    expected.extend_from_slice(&[consts::IAC, consts::DONT, 24]);
    assert_eq!(received, expected);
}
