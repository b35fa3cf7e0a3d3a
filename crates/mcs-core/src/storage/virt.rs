//! A storage implementation imported from a shared object at runtime.

use std::ffi::c_void;
use std::path::PathBuf;

use binrw::prelude::*;

use mcs_dtyp::{MaxSize, Offset, Parameter, Range, SegmentId, Size, binrw_util, load};

use crate::chunk::{self, AccessMode};
use crate::storage::c_api::{self, Channel, ChannelBuffer, Methods, STATUS_OK};
use crate::storage::{Implementation, ImplementationId, StorageError};

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Create {
    /// The shared object to load.
    #[bw(write_with = binrw_util::write_path)]
    #[br(parse_with = binrw_util::parse_path)]
    pub shared_object: PathBuf,
    /// Create parameter forwarded to the plugin's `init`, verbatim.
    pub parameter_create: Parameter,
}

macro_rules! blob_parameter {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq, Eq)]
        #[brw(little)]
        pub struct $name {
            pub parameter: Parameter,
        }
    };
}

blob_parameter!(
    /// Forwarded to the plugin's `size_max`, verbatim.
    SizeMax
);
blob_parameter!(SizeUsed);
blob_parameter!(SegmentCreate);
blob_parameter!(SegmentRemove);
blob_parameter!(ChunkDescription);
blob_parameter!(FileRead);
blob_parameter!(FileWrite);

/// The imported implementation: the loaded library, its method table and
/// the plugin instance.
pub struct Virtual {
    // dropped last; the methods and instance point into it
    _library: Option<libloading::Library>,
    methods: &'static Methods,
    instance: *mut c_void,
}

// The plugin instance is confined by the registry's lock discipline.
unsafe impl Send for Virtual {}
unsafe impl Sync for Virtual {}

impl Virtual {
    fn method<T: Copy>(&self, name: &'static str, method: &Option<T>) -> Result<T, StorageError> {
        (*method).ok_or(StorageError::MethodNotProvided { name })
    }

    /// Interprets a finished call: result bytes on `STATUS_OK`, a
    /// formatted error message otherwise.
    fn finish(status: c_api::Status, buffer: ChannelBuffer) -> Result<Vec<u8>, StorageError> {
        if status == STATUS_OK {
            Ok(buffer.into_bytes())
        } else {
            Err(StorageError::Implementation {
                reason: buffer.message(),
            })
        }
    }

    fn finish_u64(status: c_api::Status, buffer: ChannelBuffer) -> Result<u64, StorageError> {
        let bytes = Self::finish(status, buffer)?;
        Ok(load::<u64>(&bytes)?)
    }
}

impl Drop for Virtual {
    fn drop(&mut self) {
        if let Some(destroy) = self.methods.destroy {
            unsafe { destroy(self.instance) };
        }
    }
}

impl Implementation for Virtual {
    const ID: ImplementationId = ImplementationId::Virtual;

    type Create = Create;
    type SizeMax = SizeMax;
    type SizeUsed = SizeUsed;
    type SegmentCreate = SegmentCreate;
    type SegmentRemove = SegmentRemove;
    type ChunkDescription = ChunkDescription;
    type FileRead = FileRead;
    type FileWrite = FileWrite;

    fn create(parameter: Create) -> Result<Virtual, StorageError> {
        let library = unsafe { libloading::Library::new(&parameter.shared_object) }.map_err(
            |source| StorageError::DlError {
                path: parameter.shared_object.clone(),
                source,
            },
        )?;
        let methods_fn = unsafe { library.get::<c_api::MethodsFn>(c_api::METHODS_SYMBOL) }
            .map_err(|source| StorageError::DlError {
                path: parameter.shared_object.clone(),
                source,
            })?;
        let methods = unsafe { methods_fn() };
        if methods.is_null() {
            return Err(StorageError::MethodNotProvided {
                name: "mcs_core_storage_methods",
            });
        }
        // the library stays loaded for the storage's lifetime
        let methods: &'static Methods = unsafe { &*methods };

        let init = methods.init.ok_or(StorageError::MethodNotProvided { name: "init" })?;
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let create_bytes = parameter.parameter_create.bytes();
        let instance =
            unsafe { init(create_bytes.as_ptr(), create_bytes.len(), &channel) };
        if instance.is_null() {
            return Err(StorageError::Create(Box::new(StorageError::Implementation {
                reason: buffer.message(),
            })));
        }

        Ok(Virtual {
            _library: Some(library),
            methods,
            instance,
        })
    }

    fn size_max(&self, parameter: &SizeMax) -> MaxSize {
        // the trait reports sizes infallibly; a broken plugin reports empty
        self.try_size_max(parameter).unwrap_or(MaxSize::Limit(Size::ZERO))
    }

    fn size_used(&self, parameter: &SizeUsed) -> Size {
        self.try_size_used(parameter).unwrap_or(Size::ZERO)
    }

    fn segment_create(
        &mut self,
        parameter: SegmentCreate,
        size: Size,
    ) -> Result<SegmentId, StorageError> {
        let method = self.method("segment_create", &self.methods.segment_create)?;
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let bytes = parameter.parameter.bytes();
        let status = unsafe {
            method(
                self.instance,
                bytes.as_ptr(),
                bytes.len(),
                size.value(),
                &channel,
            )
        };
        Ok(SegmentId::new(Self::finish_u64(status, buffer)?))
    }

    fn segment_remove(
        &mut self,
        parameter: SegmentRemove,
        segment_id: SegmentId,
    ) -> Result<Size, StorageError> {
        let method = self.method("segment_remove", &self.methods.segment_remove)?;
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let bytes = parameter.parameter.bytes();
        let status = unsafe {
            method(
                self.instance,
                bytes.as_ptr(),
                bytes.len(),
                segment_id.value(),
                &channel,
            )
        };
        Ok(Size::new(Self::finish_u64(status, buffer)?))
    }

    fn chunk_description(
        &self,
        parameter: ChunkDescription,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
    ) -> Result<chunk::Description, StorageError> {
        let method = match access {
            AccessMode::Const => self.method(
                "chunk_const_description",
                &self.methods.chunk_const_description,
            )?,
            AccessMode::Mutable => self.method(
                "chunk_mutable_description",
                &self.methods.chunk_mutable_description,
            )?,
        };
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let bytes = parameter.parameter.bytes();
        let status = unsafe {
            method(
                self.instance,
                bytes.as_ptr(),
                bytes.len(),
                segment_id.value(),
                memory_range.begin().value(),
                memory_range.end().value(),
                &channel,
            )
        };
        let blob = Self::finish(status, buffer)
            .map_err(|source| StorageError::chunk_description(segment_id, memory_range, source))?;
        Ok(chunk::Description {
            access,
            backing: chunk::Backing::Virtual {
                methods: std::ptr::from_ref(self.methods) as u64,
                instance: self.instance as u64,
                blob,
            },
        })
    }

    fn file_read(
        &self,
        parameter: FileRead,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let method = self.method("file_read", &self.methods.file_read)?;
        self.file_transfer(method, parameter.parameter, segment_id, offset, path, range)
    }

    fn file_write(
        &self,
        parameter: FileWrite,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let method = self.method("file_write", &self.methods.file_write)?;
        self.file_transfer(method, parameter.parameter, segment_id, offset, path, range)
    }
}

type FileTransferFn = unsafe extern "C" fn(
    *mut c_void,
    *const u8,
    usize,
    u64,
    u64,
    *const u8,
    usize,
    u64,
    u64,
    *const Channel,
) -> c_api::Status;

impl Virtual {
    fn try_size_max(&self, parameter: &SizeMax) -> Result<MaxSize, StorageError> {
        let method = self.method("size_max", &self.methods.size_max)?;
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let bytes = parameter.parameter.bytes();
        let status = unsafe { method(self.instance, bytes.as_ptr(), bytes.len(), &channel) };
        let result = Self::finish(status, buffer)?;
        Ok(load::<MaxSize>(&result)?)
    }

    fn try_size_used(&self, parameter: &SizeUsed) -> Result<Size, StorageError> {
        let method = self.method("size_used", &self.methods.size_used)?;
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let bytes = parameter.parameter.bytes();
        let status = unsafe { method(self.instance, bytes.as_ptr(), bytes.len(), &channel) };
        Ok(Size::new(load::<u64>(&Self::finish(status, buffer)?)?))
    }

    fn file_transfer(
        &self,
        method: FileTransferFn,
        parameter: Parameter,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let bytes = parameter.bytes();
        let path = path.to_string_lossy().into_owned();
        let status = unsafe {
            method(
                self.instance,
                bytes.as_ptr(),
                bytes.len(),
                segment_id.value(),
                offset.value(),
                path.as_ptr(),
                path.len(),
                range.begin().value(),
                range.end().value(),
                &channel,
            )
        };
        Ok(Size::new(Self::finish_u64(status, buffer)?))
    }
}

/// A resolved plugin chunk; destructed through the plugin.
pub struct ChunkState {
    methods: &'static Methods,
    instance: *mut c_void,
    state: c_api::ChunkState,
}

unsafe impl Send for ChunkState {}
unsafe impl Sync for ChunkState {}

impl ChunkState {
    pub(crate) fn resolve(
        methods: u64,
        instance: u64,
        blob: &[u8],
        access: AccessMode,
    ) -> Result<ChunkState, StorageError> {
        // in-process description: the addresses come from the owning
        // storage in this very process
        let methods: &'static Methods = unsafe { &*(methods as *const Methods) };
        let instance = instance as *mut c_void;
        let method = match access {
            AccessMode::Const => methods
                .chunk_const_state
                .ok_or(StorageError::MethodNotProvided {
                    name: "chunk_const_state",
                })?,
            AccessMode::Mutable => {
                methods
                    .chunk_mutable_state
                    .ok_or(StorageError::MethodNotProvided {
                        name: "chunk_mutable_state",
                    })?
            }
        };
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let mut state = c_api::ChunkState {
            state: std::ptr::null_mut(),
            data: std::ptr::null_mut(),
            size: 0,
        };
        let status = unsafe { method(instance, blob.as_ptr(), blob.len(), &mut state, &channel) };
        if status != STATUS_OK {
            return Err(StorageError::Implementation {
                reason: buffer.message(),
            });
        }
        Ok(ChunkState {
            methods,
            instance,
            state,
        })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.state.data, self.state.size) }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.state.data, self.state.size) }
    }
}

impl Drop for ChunkState {
    fn drop(&mut self) {
        if let Some(destruct) = self.methods.chunk_state_destruct {
            unsafe { destruct(self.instance, self.state.state) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A minimal in-process plugin: one unlimited storage whose segments
    // are leaked boxes; enough to drive the ABI without a shared object.
    mod fake {
        use super::super::*;
        use std::collections::HashMap;

        pub struct Instance {
            pub next: u64,
            pub segments: HashMap<u64, Vec<u8>>,
        }

        unsafe fn append(channel: *const Channel, bytes: &[u8]) {
            let channel = unsafe { &*channel };
            unsafe { (channel.append)(channel.sink, bytes.as_ptr(), bytes.len()) };
        }

        pub unsafe extern "C" fn init(
            _: *const u8,
            _: usize,
            _: *const Channel,
        ) -> *mut c_void {
            Box::into_raw(Box::new(Instance {
                next: 0,
                segments: HashMap::new(),
            }))
            .cast()
        }

        pub unsafe extern "C" fn destroy(instance: *mut c_void) {
            drop(unsafe { Box::from_raw(instance.cast::<Instance>()) });
        }

        pub unsafe extern "C" fn size_used(
            instance: *mut c_void,
            _: *const u8,
            _: usize,
            channel: *const Channel,
        ) -> c_api::Status {
            let instance = unsafe { &*instance.cast::<Instance>() };
            let used: u64 = instance.segments.values().map(|s| s.len() as u64).sum();
            unsafe { append(channel, &used.to_le_bytes()) };
            STATUS_OK
        }

        pub unsafe extern "C" fn segment_create(
            instance: *mut c_void,
            _: *const u8,
            _: usize,
            size: u64,
            channel: *const Channel,
        ) -> c_api::Status {
            let instance = unsafe { &mut *instance.cast::<Instance>() };
            let id = instance.next;
            instance.next += 1;
            instance.segments.insert(id, vec![0u8; size as usize]);
            unsafe { append(channel, &id.to_le_bytes()) };
            STATUS_OK
        }

        pub unsafe extern "C" fn segment_remove(
            instance: *mut c_void,
            _: *const u8,
            _: usize,
            segment_id: u64,
            channel: *const Channel,
        ) -> c_api::Status {
            let instance = unsafe { &mut *instance.cast::<Instance>() };
            match instance.segments.remove(&segment_id) {
                Some(segment) => {
                    unsafe { append(channel, &(segment.len() as u64).to_le_bytes()) };
                    STATUS_OK
                }
                None => {
                    unsafe { append(channel, b"unknown segment") };
                    1
                }
            }
        }

        pub fn methods() -> Methods {
            Methods {
                init: Some(init),
                destroy: Some(destroy),
                size_max: None,
                size_used: Some(size_used),
                segment_create: Some(segment_create),
                segment_remove: Some(segment_remove),
                chunk_const_description: None,
                chunk_mutable_description: None,
                chunk_const_state: None,
                chunk_mutable_state: None,
                chunk_state_destruct: None,
                file_read: None,
                file_write: None,
            }
        }
    }

    fn virtual_over(methods: &'static Methods) -> Virtual {
        let mut buffer = ChannelBuffer::default();
        let channel = buffer.channel();
        let instance = unsafe { fake::init(std::ptr::null(), 0, &channel) };
        Virtual {
            _library: None,
            methods,
            instance,
        }
    }

    #[test]
    fn results_come_back_through_the_channel() {
        let methods: &'static Methods = Box::leak(Box::new(fake::methods()));
        let mut storage = virtual_over(methods);

        let segment_id = storage
            .segment_create(SegmentCreate::default(), Size::new(24))
            .unwrap();
        assert_eq!(segment_id, SegmentId::new(0));
        assert_eq!(storage.size_used(&SizeUsed::default()), Size::new(24));
        assert_eq!(
            storage
                .segment_remove(SegmentRemove::default(), segment_id)
                .unwrap(),
            Size::new(24)
        );
    }

    #[test]
    fn plugin_failures_surface_as_implementation_errors() {
        let methods: &'static Methods = Box::leak(Box::new(fake::methods()));
        let mut storage = virtual_over(methods);

        match storage.segment_remove(SegmentRemove::default(), SegmentId::new(7)) {
            Err(StorageError::Implementation { reason }) => {
                assert!(reason.contains("unknown segment"));
            }
            other => panic!("expected Implementation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_methods_are_reported_by_name() {
        let methods: &'static Methods = Box::leak(Box::new(fake::methods()));
        let storage = virtual_over(methods);

        match storage.chunk_description(
            ChunkDescription::default(),
            SegmentId::new(0),
            Range::at(Offset::ZERO, Size::new(1)),
            AccessMode::Const,
        ) {
            Err(StorageError::MethodNotProvided { name }) => {
                assert_eq!(name, "chunk_const_description");
            }
            other => panic!("expected MethodNotProvided, got {other:?}"),
        }
    }
}
