// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Wire protocol between the daemon and its clients.
//!
//! One JSON object per line. Byte payloads travel as hex strings.

use serde::{Deserialize, Serialize};

use crate::access::CloseOutcome;
use crate::error::{ErrorCode, KeeperError, SecretKeeperError, SecretKeeperResult};
use crate::identity::IdentityResolver;
use crate::keeper::{DeviceGeometry, SecretKeeper, SlotMetrics};
use crate::session::Session;
use crate::types::{HandleId, OpenMode, TransferOp};

/// Client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Open {
        /// Raw open flags (2 = write only, 4 = read only).
        mode: u32,
    },
    Close {
        handle: HandleId,
    },
    Write {
        handle: HandleId,
        offset: u64,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    Read {
        handle: HandleId,
        offset: u64,
        len: usize,
    },
    Stat,
}

/// Daemon reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Opened {
        handle: HandleId,
    },
    Closed {
        erased: bool,
    },
    Written {
        bytes: usize,
    },
    Data {
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    Stat {
        geometry: DeviceGeometry,
        metrics: SlotMetrics,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    /// The request line could not be understood at all.
    Malformed {
        message: String,
    },
}

impl Response {
    /// Result code of this reply.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { code, .. } => Some(*code),
            Self::Malformed { .. } => None,
            _ => Some(ErrorCode::Success),
        }
    }
}

impl From<KeeperError> for Response {
    fn from(err: KeeperError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Room in a request line for everything except the hex payload.
pub const REQUEST_ENVELOPE: usize = 256;

/// Longest request line, newline excluded, worth reading for a slot of
/// `capacity` bytes. A write payload is hex, so two characters per byte.
pub fn request_line_limit(capacity: usize) -> usize {
    capacity.saturating_mul(2).saturating_add(REQUEST_ENVELOPE)
}

/// Parse one request line.
pub fn decode_request(line: &str) -> SecretKeeperResult<Request> {
    serde_json::from_str(line.trim()).map_err(|e| SecretKeeperError::Protocol {
        message: format!("bad request: {}", e),
    })
}

/// Parse one response line.
pub fn decode_response(line: &str) -> SecretKeeperResult<Response> {
    serde_json::from_str(line.trim()).map_err(|e| SecretKeeperError::Protocol {
        message: format!("bad response: {}", e),
    })
}

/// Serialize a message as a single newline-terminated line.
pub fn encode_line<T: Serialize>(message: &T) -> SecretKeeperResult<String> {
    let mut line = serde_json::to_string(message).map_err(|e| SecretKeeperError::Protocol {
        message: format!("encode failed: {}", e),
    })?;
    line.push('\n');
    Ok(line)
}

/// Apply one request on behalf of `session`.
pub fn dispatch<R: IdentityResolver>(
    session: &mut Session,
    keeper: &mut SecretKeeper<R>,
    request: Request,
) -> Response {
    let result = match request {
        Request::Open { mode } => session
            .open(keeper, OpenMode::from_flags(mode))
            .map(|handle| Response::Opened { handle }),
        Request::Close { handle } => session.close(keeper, handle).map(|outcome| {
            Response::Closed {
                erased: outcome == CloseOutcome::Erased,
            }
        }),
        Request::Write {
            handle,
            offset,
            mut data,
        } => session
            .transfer(keeper, handle, TransferOp::Write, offset, &mut [&mut data[..]])
            .map(|bytes| Response::Written { bytes }),
        Request::Read {
            handle,
            offset,
            len,
        } => {
            let mut buf = vec![0u8; len.min(keeper.slot().capacity())];
            let moved =
                session.transfer(keeper, handle, TransferOp::Read, offset, &mut [&mut buf[..]]);
            moved.map(|bytes| {
                buf.truncate(bytes);
                Response::Data { data: buf }
            })
        }
        Request::Stat => Ok(Response::Stat {
            geometry: keeper.geometry(),
            metrics: keeper.metrics(),
        }),
    };

    result.unwrap_or_else(Response::from)
}

/// Hex encoding for byte payloads.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PeerRegistry;
    use crate::types::{CallerId, Capacity, Endpoint, MAX_CAPACITY};

    fn setup() -> (SecretKeeper<PeerRegistry>, Session) {
        let peers = PeerRegistry::new();
        peers.register(Endpoint::new(1), CallerId::new(1000));
        (
            SecretKeeper::new(Capacity::new(8).unwrap(), peers),
            Session::new(Endpoint::new(1)),
        )
    }

    #[test]
    fn test_request_wire_format() {
        let line = encode_line(&Request::Write {
            handle: HandleId::new(1),
            offset: 0,
            data: b"hi".to_vec(),
        })
        .unwrap();
        assert_eq!(
            line,
            "{\"op\":\"write\",\"handle\":1,\"offset\":0,\"data\":\"6869\"}\n"
        );
        assert_eq!(
            decode_request("{\"op\":\"stat\"}").unwrap(),
            Request::Stat
        );
    }

    #[test]
    fn test_full_write_fits_line_limit() {
        let capacity = MAX_CAPACITY;
        let line = encode_line(&Request::Write {
            handle: HandleId::new(u32::MAX),
            offset: u64::MAX,
            data: vec![0xab; capacity],
        })
        .unwrap();
        assert!(line.trim_end().len() <= request_line_limit(capacity));

        let line = encode_line(&Request::Write {
            handle: HandleId::new(1),
            offset: 0,
            data: vec![0xab; capacity + REQUEST_ENVELOPE],
        })
        .unwrap();
        assert!(line.trim_end().len() > request_line_limit(capacity));
    }

    #[test]
    fn test_bad_hex_is_protocol_error() {
        let err = decode_request("{\"op\":\"write\",\"handle\":1,\"offset\":0,\"data\":\"zz\"}")
            .unwrap_err();
        assert!(matches!(err, SecretKeeperError::Protocol { .. }));
    }

    #[test]
    fn test_dispatch_round_trip() {
        let (mut keeper, mut session) = setup();

        let Response::Opened { handle } =
            dispatch(&mut session, &mut keeper, Request::Open { mode: 2 })
        else {
            panic!("write open failed");
        };
        let reply = dispatch(
            &mut session,
            &mut keeper,
            Request::Write {
                handle,
                offset: 0,
                data: b"hello".to_vec(),
            },
        );
        assert_eq!(reply, Response::Written { bytes: 5 });
        assert_eq!(
            dispatch(&mut session, &mut keeper, Request::Close { handle }),
            Response::Closed { erased: false }
        );

        let Response::Opened { handle } =
            dispatch(&mut session, &mut keeper, Request::Open { mode: 4 })
        else {
            panic!("read open failed");
        };
        let reply = dispatch(
            &mut session,
            &mut keeper,
            Request::Read {
                handle,
                offset: 0,
                len: 1024,
            },
        );
        assert_eq!(
            reply,
            Response::Data {
                data: b"hello".to_vec()
            }
        );
        assert_eq!(
            dispatch(&mut session, &mut keeper, Request::Close { handle }),
            Response::Closed { erased: true }
        );
    }

    #[test]
    fn test_dispatch_reports_error_codes() {
        let (mut keeper, mut session) = setup();

        let reply = dispatch(&mut session, &mut keeper, Request::Open { mode: 6 });
        assert_eq!(reply.code(), Some(ErrorCode::InvalidMode));

        let reply = dispatch(
            &mut session,
            &mut keeper,
            Request::Close {
                handle: HandleId::new(42),
            },
        );
        assert_eq!(reply.code(), Some(ErrorCode::HandleNotOpen));
    }

    #[test]
    fn test_stat() {
        let (mut keeper, mut session) = setup();
        match dispatch(&mut session, &mut keeper, Request::Stat) {
            Response::Stat { geometry, metrics } => {
                assert_eq!(geometry.size, 8);
                assert!(!metrics.occupied);
                assert_eq!(metrics.open_count, 0);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }
}
