//! C ABI of the virtual storage plugin.
//!
//! A plugin is a shared object exporting `mcs_core_storage_methods`, a
//! function returning the [`Methods`] table. Results and failures both
//! travel through an append-only byte [`Channel`]: a zero status means the
//! channel holds the result bytes, any other status means it holds a
//! formatted error message. Nothing ever unwinds across this boundary.

use std::ffi::c_void;

/// Status code of every fallible plugin method.
pub type Status = i32;

pub const STATUS_OK: Status = 0;

/// Append-only byte sink passed into every plugin method.
#[repr(C)]
pub struct Channel {
    pub sink: *mut c_void,
    pub append: unsafe extern "C" fn(sink: *mut c_void, bytes: *const u8, count: usize),
}

/// A chunk's resolved memory span.
#[repr(C)]
pub struct ChunkState {
    /// Plugin-owned cookie handed back to `chunk_state_destruct`.
    pub state: *mut c_void,
    pub data: *mut u8,
    pub size: usize,
}

/// The plugin's method table. Every entry may be null; calling a missing
/// method fails with `MethodNotProvided`.
#[repr(C)]
pub struct Methods {
    /// Creates an instance from the serialized create parameter. Returns
    /// null after appending an error message to the channel.
    pub init: Option<
        unsafe extern "C" fn(
            parameter: *const u8,
            parameter_size: usize,
            channel: *const Channel,
        ) -> *mut c_void,
    >,
    pub destroy: Option<unsafe extern "C" fn(instance: *mut c_void)>,

    /// Appends the encoded `MaxSize` to the channel.
    pub size_max: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            channel: *const Channel,
        ) -> Status,
    >,
    /// Appends the used byte count as a little-endian `u64`.
    pub size_used: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            channel: *const Channel,
        ) -> Status,
    >,

    /// Appends the new segment id as a little-endian `u64`.
    pub segment_create: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            size: u64,
            channel: *const Channel,
        ) -> Status,
    >,
    /// Appends the freed byte count as a little-endian `u64`.
    pub segment_remove: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            segment_id: u64,
            channel: *const Channel,
        ) -> Status,
    >,

    /// Appends an opaque description blob for a read-only chunk.
    pub chunk_const_description: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            segment_id: u64,
            range_begin: u64,
            range_end: u64,
            channel: *const Channel,
        ) -> Status,
    >,
    /// Appends an opaque description blob for a writable chunk.
    pub chunk_mutable_description: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            segment_id: u64,
            range_begin: u64,
            range_end: u64,
            channel: *const Channel,
        ) -> Status,
    >,

    /// Resolves a description blob into a [`ChunkState`].
    pub chunk_const_state: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            description: *const u8,
            description_size: usize,
            out: *mut ChunkState,
            channel: *const Channel,
        ) -> Status,
    >,
    pub chunk_mutable_state: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            description: *const u8,
            description_size: usize,
            out: *mut ChunkState,
            channel: *const Channel,
        ) -> Status,
    >,
    pub chunk_state_destruct: Option<unsafe extern "C" fn(instance: *mut c_void, state: *mut c_void)>,

    /// Appends the transferred byte count as a little-endian `u64`.
    pub file_read: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            segment_id: u64,
            offset: u64,
            path: *const u8,
            path_size: usize,
            range_begin: u64,
            range_end: u64,
            channel: *const Channel,
        ) -> Status,
    >,
    pub file_write: Option<
        unsafe extern "C" fn(
            instance: *mut c_void,
            parameter: *const u8,
            parameter_size: usize,
            segment_id: u64,
            offset: u64,
            path: *const u8,
            path_size: usize,
            range_begin: u64,
            range_end: u64,
            channel: *const Channel,
        ) -> Status,
    >,
}

/// The exported entry point's name and type.
pub const METHODS_SYMBOL: &[u8] = b"mcs_core_storage_methods";

pub type MethodsFn = unsafe extern "C" fn() -> *const Methods;

/// A growable byte buffer usable as the channel's sink.
#[derive(Default)]
pub struct ChannelBuffer {
    bytes: Vec<u8>,
}

unsafe extern "C" fn append_to_buffer(sink: *mut c_void, bytes: *const u8, count: usize) {
    let buffer = unsafe { &mut *sink.cast::<ChannelBuffer>() };
    buffer
        .bytes
        .extend_from_slice(unsafe { std::slice::from_raw_parts(bytes, count) });
}

impl ChannelBuffer {
    /// The channel writing into this buffer; valid while the buffer is
    /// neither moved nor dropped.
    pub fn channel(&mut self) -> Channel {
        Channel {
            sink: std::ptr::from_mut(self).cast(),
            append: append_to_buffer,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The buffer's contents as an error message.
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_channel_appends_into_its_sink() {
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        unsafe {
            (channel.append)(channel.sink, b"abc".as_ptr(), 3);
            (channel.append)(channel.sink, b"def".as_ptr(), 3);
        }
        assert_eq!(buffer.bytes(), b"abcdef");
    }
}
