#![allow(dead_code)]

pub use omnik_export::prelude::*;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory;
impl Factory {
    pub const SERIAL: u64 = 602123456;

    /// A 153 byte three-phase data frame with a valid trailing checksum.
    /// The third string is not fitted.
    pub fn data_frame() -> Vec<u8> {
        let mut f = vec![0u8; 153];
        f[0] = 0x68;
        f[1] = (153 - omnik::packet::FRAME_OVERHEAD) as u8;
        f[2..4].copy_from_slice(&[0x51, 0xb0]);
        let serial = (Self::SERIAL as u32).to_le_bytes();
        f[4..8].copy_from_slice(&serial);
        f[8..12].copy_from_slice(&serial);
        f[12..15].copy_from_slice(&[0x81, 0x02, 0x01]);
        f[15..31].copy_from_slice(b"NLDN402013212035");
        Self::put_u16(&mut f, 31, 366); // 36.6 C
        Self::put_u16(&mut f, 33, 2861); // v_pv_1 286.1 V
        Self::put_u16(&mut f, 35, 2790); // v_pv_2 279.0 V
        Self::put_u16(&mut f, 37, 0xffff);
        Self::put_u16(&mut f, 39, 54); // i_pv_1 5.4 A
        Self::put_u16(&mut f, 41, 49); // i_pv_2 4.9 A
        Self::put_u16(&mut f, 43, 0xffff);
        Self::put_u16(&mut f, 45, 127); // i_ac_1 12.7 A
        Self::put_u16(&mut f, 47, 126);
        Self::put_u16(&mut f, 49, 128);
        Self::put_u16(&mut f, 51, 2334); // v_ac_1 233.4 V
        Self::put_u16(&mut f, 53, 2351);
        Self::put_u16(&mut f, 55, 2329);
        Self::put_u16(&mut f, 57, 4998); // f_ac_1 49.98 Hz
        Self::put_u16(&mut f, 59, 2950); // p_ac_1 2950 W
        Self::put_u16(&mut f, 61, 4999);
        Self::put_u16(&mut f, 63, 2940);
        Self::put_u16(&mut f, 65, 5001);
        Self::put_u16(&mut f, 67, 2960);
        Self::put_u16(&mut f, 69, 1234); // e_today 12.34 kWh
        f[71..75].copy_from_slice(&123456u32.to_be_bytes()); // e_total 12345.6 kWh
        f[75..79].copy_from_slice(&9876u32.to_be_bytes()); // h_total
        Self::put_u16(&mut f, 79, 1);
        Self::put_u16(&mut f, 81, 2401); // fault values
        Self::put_u16(&mut f, 83, 5012);
        Self::put_u16(&mut f, 85, 17);
        Self::put_u16(&mut f, 87, 452);
        Self::put_u16(&mut f, 89, 3021);
        Self::put_u16(&mut f, 91, 33);
        f[93..97].copy_from_slice(&0x0004_0001u32.to_be_bytes());
        f[101..116].copy_from_slice(b"NL1-V1.0-0077-4");
        f[121..130].copy_from_slice(b"V2.0-0028");
        Self::seal(&mut f);
        f
    }

    /// A status frame carrying `phrase`, e.g. `NO INVERTER ONLINE`.
    pub fn terminal_frame(phrase: &str) -> Vec<u8> {
        let mut f = vec![0x68, (phrase.len() + 2) as u8, 0x41, 0xb0];
        let serial = (Self::SERIAL as u32).to_le_bytes();
        f.extend_from_slice(&serial);
        f.extend_from_slice(&serial);
        f.extend_from_slice(phrase.as_bytes());
        f.extend_from_slice(b"\r\n");
        f.extend_from_slice(&[0, 0]);
        Self::seal(&mut f);
        f
    }

    pub fn reading() -> Reading {
        omnik::packet::decode_reading(&Self::data_frame()).expect("factory frame decodes")
    }

    pub fn logger_config(addr: SocketAddr) -> config::Logger {
        config::Logger {
            host: addr.ip().to_string(),
            port: addr.port(),
            timeout: Duration::from_secs(2),
            serial: Self::SERIAL,
            strict_checksum: false,
        }
    }

    pub fn datalog(path: &std::path::Path) -> Plugin {
        plugins::Datalog::new(config::Datalog {
            path: path.to_string_lossy().to_string(),
        })
        .into()
    }

    fn put_u16(f: &mut [u8], offset: usize, value: u16) {
        f[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    // last two bytes become checksum and end marker
    fn seal(f: &mut [u8]) {
        let len = f.len();
        f[len - 2] = omnik::packet::Request::checksum(&f[1..len - 2]);
        f[len - 1] = 0x16;
    }
}

/// Scripted stand-in for the Wi-Fi logger, listening on localhost.
pub struct FakeLogger {
    listener: TcpListener,
}

impl FakeLogger {
    pub async fn bind() -> Result<Self> {
        Ok(Self {
            listener: TcpListener::bind("127.0.0.1:0").await?,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().expect("bound listener has an address")
    }

    /// Accepts one client, reads its request, writes each reply chunk with a
    /// short pause in between, then waits for the client to hang up. Returns
    /// the request bytes.
    pub async fn serve(self, replies: Vec<Vec<u8>>, close_after: bool) -> Result<Vec<u8>> {
        let (mut socket, _) = self.listener.accept().await?;

        let mut request = vec![0u8; omnik::packet::REQUEST_LEN];
        socket.read_exact(&mut request).await?;

        for chunk in replies {
            socket.write_all(&chunk).await?;
            socket.flush().await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        if close_after {
            socket.shutdown().await?;
        }

        Self::wait_for_hangup(&mut socket).await?;

        Ok(request)
    }

    /// Accepts one client and reads its request but never answers.
    pub async fn serve_silently(self) -> Result<Vec<u8>> {
        let (mut socket, _) = self.listener.accept().await?;

        let mut request = vec![0u8; omnik::packet::REQUEST_LEN];
        socket.read_exact(&mut request).await?;

        Self::wait_for_hangup(&mut socket).await?;

        Ok(request)
    }

    /// True if a client connected within `within`.
    pub async fn was_contacted(self, within: Duration) -> bool {
        tokio::time::timeout(within, self.listener.accept()).await.is_ok()
    }

    async fn wait_for_hangup(socket: &mut tokio::net::TcpStream) -> Result<()> {
        let mut buf = [0u8; 64];
        loop {
            match tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return Ok(()),
                Ok(Ok(_)) => continue,
                Err(_) => bail!("client never closed the connection"),
            }
        }
    }
}

/// Address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

pub fn taxonomy(err: &anyhow::Error) -> Option<&Error> {
    err.downcast_ref::<Error>()
}
