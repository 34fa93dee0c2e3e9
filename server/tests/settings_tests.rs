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

//! Start a server from files on disk and log in

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use varidial_server::{Settings, UserFile};
use varidial_service::ChatServer;

async fn read_until(stream: &mut TcpStream, pattern: &str) -> String {
    let mut seen = Vec::new();
    let mut byte = [0u8; 1];
    while !seen.ends_with(pattern.as_bytes()) {
        let n = timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(n, 1, "connection closed early: {:?}", String::from_utf8_lossy(&seen));
        seen.push(byte[0]);
    }
    String::from_utf8(seen).unwrap()
}

#[tokio::test]
async fn test_server_from_settings_files() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("varidial.toml");
    let users_path = dir.path().join("users.toml");
    let banner_path = dir.path().join("login.txt");

    tokio::fs::write(&banner_path, "** Night Owl **\n").await.unwrap();
    tokio::fs::write(
        &users_path,
        "[[user]]\nnumber = 42\nusername = \"owl\"\npassword = \"hoot\"\nlevel = 3\n",
    )
    .await
    .unwrap();
    tokio::fs::write(
        &settings_path,
        format!(
            "[server]\nbind = \"127.0.0.1:0\"\nsystem_name = \"Night Owl 2.0\"\nbanner = {:?}\n\n[directory]\nusers = {:?}\n",
            banner_path.display().to_string(),
            users_path.display().to_string(),
        ),
    )
    .await
    .unwrap();

    let settings = Settings::load(&settings_path).await.unwrap();
    let users = UserFile::load(&settings.directory.users).await.unwrap();
    let server = ChatServer::new(settings.server_config(), Arc::new(users.into_directory()))
        .await
        .unwrap();
    server.start().await.unwrap();

    let mut client = TcpStream::connect(server.bind_address()).await.unwrap();
    assert_eq!(
        read_until(&mut client, "Enter your number: ").await,
        "** Night Owl **\r\nNight Owl 2.0\r\nEnter your number: "
    );
    client.write_all(b"42\r\nhoot\r\n").await.unwrap();
    read_until(&mut client, "/? for help\r\n").await;
    read_until(&mut client, " +#1:owl\r\n").await;

    client.write_all(b"who-who\r\n").await.unwrap();
    assert_eq!(read_until(&mut client, "\r\n").await, "#1<T1:owl ]: who-who\r\n");

    client.write_all(b"/i\r\n").await.unwrap();
    assert_eq!(
        read_until(&mut client, "Night Owl 2.0\r\n").await,
        "\r\n->.\r\n    Night Owl 2.0\r\n"
    );

    server.shutdown().await.unwrap();
}
