//! Typed device operations built on [`Session::exchange`].

use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};
use mcuwire_frame::command::{self, command_name};
use mcuwire_frame::{
    decode_scope_layout, encode_value, HeartbeatInfo, HelloInfo, ScopeChannelInfo,
    ScopeControlReply, TypedReadReply, ValueError, ValueType,
};
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::event::{category, FaultEvent, FaultSeverity, SessionEvent, WriteResult, FAULT_CMD_FAIL};
use crate::session::Session;

/// Element count sent with typed reads and writes. Only scalars are supported.
const SINGLE: u16 = 1;

impl Session {
    /// Capability handshake.
    pub fn hello(&self) -> Result<HelloInfo> {
        let info = self.reported(command::HELLO, |session| {
            let rsp = session.call(command::HELLO, &[], session.config().request_timeout)?;
            Ok(HelloInfo::decode(&rsp)?)
        })?;
        self.log(
            category::PROTO,
            format!(
                "HELLO protocol=0x{:04X} caps=0x{:08X}",
                info.protocol_version,
                info.capabilities.bits()
            ),
        );
        Ok(info)
    }

    pub fn heartbeat(&self) -> Result<HeartbeatInfo> {
        self.reported(command::HEARTBEAT, |session| {
            let rsp = session.call(command::HEARTBEAT, &[], session.config().request_timeout)?;
            Ok(HeartbeatInfo::decode(&rsp)?)
        })
    }

    /// Ask the device to change motor mode.
    ///
    /// A refusal is also published as a `CMD_FAIL` warning.
    pub fn motor_control(&self, mode: u8) -> Result<()> {
        match self.call(command::MOTOR_CONTROL, &[mode], self.config().request_timeout) {
            Ok(_) => {
                self.log(category::CMD, format!("Motor mode {mode} accepted"));
                Ok(())
            }
            Err(err) => {
                if let SessionError::Rejected { error_code, .. } = &err {
                    self.log(
                        category::CMD,
                        format!(
                            "MOTOR_CTRL mode={mode} failed err={}",
                            error_code.as_byte()
                        ),
                    );
                    self.publish(SessionEvent::Fault(FaultEvent {
                        timestamp: SystemTime::now(),
                        severity: FaultSeverity::Warning,
                        code: FAULT_CMD_FAIL.to_string(),
                        message: err.to_string(),
                        context: format!("motor mode {mode}"),
                    }));
                }
                Err(err)
            }
        }
    }

    pub fn scope_layout(&self) -> Result<Vec<ScopeChannelInfo>> {
        self.reported(command::SCOPE_LAYOUT, |session| {
            let rsp = session.call(command::SCOPE_LAYOUT, &[], session.config().request_timeout)?;
            Ok(decode_scope_layout(&rsp)?)
        })
    }

    /// Enable or disable device-side sampling. Returns the settings the
    /// device applied, which may differ from the ones requested.
    pub fn scope_control(&self, enable: bool, period_ms: u16) -> Result<ScopeControlReply> {
        let payload = scope_control_payload(enable, period_ms);
        let reply = self.reported(command::SCOPE_CONTROL, |session| {
            let rsp = session.call(
                command::SCOPE_CONTROL,
                &payload,
                session.config().scope_control_timeout,
            )?;
            Ok(ScopeControlReply::decode(&rsp)?)
        })?;
        debug!(
            enabled = reply.enabled,
            period_ms = reply.period_ms,
            channels = reply.channel_count,
            "scope control applied"
        );
        Ok(reply)
    }

    /// Read one value from device memory.
    pub fn read_typed(&self, address: u32, ty: ValueType) -> Result<f64> {
        if ty.wire_width().is_none() {
            return Err(ValueError::NotNumeric.into());
        }
        let payload = typed_read_payload(address, ty);
        let rsp = self.call(command::READ_TYPED, &payload, self.config().request_timeout)?;
        Ok(TypedReadReply::decode(&rsp)?.single_number()?)
    }

    /// Write one value to device memory, saturating it to the target type.
    ///
    /// Every attempt, successful or not, is published as a [`WriteResult`].
    pub fn write_typed(&self, address: u32, ty: ValueType, value: f64) -> Result<()> {
        let outcome = encode_value(ty, value)
            .map_err(SessionError::from)
            .and_then(|raw| {
                let payload = typed_write_payload(address, ty, &raw);
                self.call(command::WRITE_TYPED, &payload, self.config().request_timeout)
            });

        let detail = match &outcome {
            Ok(_) => format!("{ty} {value}"),
            Err(err) => err.to_string(),
        };
        self.publish(SessionEvent::WriteResult(WriteResult {
            timestamp: SystemTime::now(),
            target: format!("0x{address:08X}"),
            success: outcome.is_ok(),
            detail,
        }));
        outcome.map(|_| ())
    }

    /// Read `len` raw bytes from device memory.
    pub fn read_block(&self, address: u32, len: u16) -> Result<Bytes> {
        let payload = block_read_payload(address, len);
        let rsp = self.call(command::READ_BLOCK, &payload, self.config().request_timeout)?;
        Ok(rsp.data)
    }

    /// Write raw bytes to device memory.
    pub fn write_block(&self, address: u32, data: &[u8]) -> Result<()> {
        let payload = block_write_payload(address, data)?;
        self.call(command::WRITE_BLOCK, &payload, self.config().request_timeout)?;
        Ok(())
    }

    /// Run `op`, publishing `"{NAME} failed: {err}"` under `PROTO` if it fails.
    fn reported<T>(&self, command: u16, op: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        op(self).inspect_err(|err| {
            self.log(
                category::PROTO,
                format!("{} failed: {err}", command_name(command)),
            );
        })
    }
}

fn typed_read_payload(address: u32, ty: ValueType) -> BytesMut {
    let mut buf = BytesMut::with_capacity(7);
    buf.put_u32_le(address);
    buf.put_u8(ty.as_byte());
    buf.put_u16_le(SINGLE);
    buf
}

fn typed_write_payload(address: u32, ty: ValueType, raw: &[u8]) -> BytesMut {
    let mut buf = typed_read_payload(address, ty);
    buf.put_slice(raw);
    buf
}

fn block_read_payload(address: u32, len: u16) -> BytesMut {
    let mut buf = BytesMut::with_capacity(6);
    buf.put_u32_le(address);
    buf.put_u16_le(len);
    buf
}

fn block_write_payload(address: u32, data: &[u8]) -> Result<BytesMut> {
    let len = u16::try_from(data.len()).map_err(|_| {
        SessionError::Frame(mcuwire_frame::FrameError::PayloadTooLarge {
            size: data.len(),
            max: u16::MAX as usize,
        })
    })?;
    let mut buf = block_read_payload(address, len);
    buf.put_slice(data);
    Ok(buf)
}

fn scope_control_payload(enable: bool, period_ms: u16) -> [u8; 3] {
    let period = period_ms.to_le_bytes();
    [u8::from(enable), period[0], period[1]]
}
