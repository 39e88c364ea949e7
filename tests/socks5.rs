//! SOCKS5 CONNECT through a running server

use std::time::Duration;

use fast_socks5::client::{Config as ClientConfig, Socks5Stream};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time,
};

use socks5_rust::{run_server, Config, ListenAddr};

const ECHO_PAYLOAD: &[u8] = b"hello from socks5d";

async fn spawn_echo_server(addr: &str) {
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(s) => s,
                Err(..) => break,
            };

            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(..) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
}

async fn assert_echo_through<S>(mut stream: S)
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    stream.write_all(ECHO_PAYLOAD).await.unwrap();

    let mut buf = vec![0u8; ECHO_PAYLOAD.len()];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, ECHO_PAYLOAD);
}

#[tokio::test]
async fn socks5_connect_no_auth() {
    let mut config = Config::default();
    config.listen = ListenAddr::new("127.0.0.1", 41080);

    tokio::spawn(run_server(config));
    spawn_echo_server("127.0.0.1:41081").await;
    time::sleep(Duration::from_millis(300)).await;

    let stream = Socks5Stream::connect(
        "127.0.0.1:41080",
        "127.0.0.1".to_owned(),
        41081,
        ClientConfig::default(),
    )
    .await
    .unwrap();

    assert_echo_through(stream).await;
}

#[tokio::test]
async fn socks5_connect_password_auth() {
    let mut config = Config::default();
    config.listen = ListenAddr::new("127.0.0.1", 41090);
    config.username = Some("kaito".to_owned());
    config.password = Some("hyperion".to_owned());

    tokio::spawn(run_server(config));
    spawn_echo_server("127.0.0.1:41091").await;
    time::sleep(Duration::from_millis(300)).await;

    let stream = Socks5Stream::connect_with_password(
        "127.0.0.1:41090",
        "127.0.0.1".to_owned(),
        41091,
        "kaito".to_owned(),
        "hyperion".to_owned(),
        ClientConfig::default(),
    )
    .await
    .unwrap();

    assert_echo_through(stream).await;
}

#[tokio::test]
async fn socks5_connect_rejects_wrong_password() {
    let mut config = Config::default();
    config.listen = ListenAddr::new("127.0.0.1", 41100);
    config.username = Some("kaito".to_owned());
    config.password = Some("hyperion".to_owned());

    tokio::spawn(run_server(config));
    time::sleep(Duration::from_millis(300)).await;

    let result = Socks5Stream::connect_with_password(
        "127.0.0.1:41100",
        "127.0.0.1".to_owned(),
        41101,
        "kaito".to_owned(),
        "wrong".to_owned(),
        ClientConfig::default(),
    )
    .await;

    assert!(result.is_err());
}
