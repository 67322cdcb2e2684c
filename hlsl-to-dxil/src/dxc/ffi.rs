//! Minimal COM surface of the DXC compiler API.
//!
//! Only the slice of `dxcapi.h` this crate calls is declared: instance
//! creation, `IDxcCompiler3::Compile`, and the result/blob accessors. Vtable
//! field order must match the header exactly; these are raw ABI contracts.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

pub(crate) type Hresult = i32;

pub(crate) const E_POINTER: Hresult = 0x8000_4003u32 as Hresult;

pub(crate) const fn succeeded(hr: Hresult) -> bool {
    hr >= 0
}

#[repr(C)]
pub(crate) struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

pub(crate) const CLSID_DXC_COMPILER: Guid = Guid {
    data1: 0x73e2_2d93,
    data2: 0xe6ce,
    data3: 0x47f3,
    data4: [0xb5, 0xbf, 0xf0, 0x66, 0x4f, 0x39, 0xc1, 0xb0],
};

pub(crate) const IID_IDXC_COMPILER3: Guid = Guid {
    data1: 0x228b_4687,
    data2: 0x5a6a,
    data3: 0x4730,
    data4: [0x90, 0x0c, 0x97, 0x02, 0xb2, 0x20, 0x3f, 0x54],
};

pub(crate) const IID_IDXC_RESULT: Guid = Guid {
    data1: 0x5834_6cda,
    data2: 0xdde7,
    data3: 0x4497,
    data4: [0x94, 0x61, 0x6f, 0x87, 0xaf, 0x5e, 0x06, 0x59],
};

pub(crate) const IID_IDXC_BLOB: Guid = Guid {
    data1: 0x8ba5_fb08,
    data2: 0x5195,
    data3: 0x40e2,
    data4: [0xac, 0x58, 0x0d, 0x98, 0x9c, 0x3a, 0x01, 0x02],
};

pub(crate) const IID_IDXC_BLOB_UTF8: Guid = Guid {
    data1: 0x3da6_36c9,
    data2: 0xba71,
    data3: 0x4024,
    data4: [0xa3, 0x01, 0x30, 0xcb, 0xf1, 0x25, 0x30, 0x5b],
};

pub(crate) const DXC_OUT_OBJECT: u32 = 1;
pub(crate) const DXC_OUT_ERRORS: u32 = 2;

/// `CP_UTF8`; tells DXC the source buffer is UTF-8 text.
pub(crate) const DXC_CP_UTF8: u32 = 65001;

/// A borrowed, encoded text or binary buffer handed to the compiler.
#[repr(C)]
pub(crate) struct DxcBuffer {
    pub ptr: *const c_void,
    pub size: usize,
    pub encoding: u32,
}

pub(crate) type DxcCreateInstanceFn = unsafe extern "system" fn(
    rclsid: *const Guid,
    riid: *const Guid,
    object: *mut *mut c_void,
) -> Hresult;

#[repr(C)]
pub(crate) struct IUnknownVtbl {
    pub query_interface:
        unsafe extern "system" fn(*mut c_void, *const Guid, *mut *mut c_void) -> Hresult,
    pub add_ref: unsafe extern "system" fn(*mut c_void) -> u32,
    pub release: unsafe extern "system" fn(*mut c_void) -> u32,
}

#[repr(C)]
pub(crate) struct IDxcCompiler3Vtbl {
    pub unknown: IUnknownVtbl,
    pub compile: unsafe extern "system" fn(
        this: *mut c_void,
        source: *const DxcBuffer,
        arguments: *const *const u16,
        argument_count: u32,
        include_handler: *mut c_void,
        riid: *const Guid,
        result: *mut *mut c_void,
    ) -> Hresult,
    pub disassemble: unsafe extern "system" fn(
        this: *mut c_void,
        object: *const DxcBuffer,
        riid: *const Guid,
        result: *mut *mut c_void,
    ) -> Hresult,
}

/// `IDxcResult` including the inherited `IDxcOperationResult` slots.
#[repr(C)]
pub(crate) struct IDxcResultVtbl {
    pub unknown: IUnknownVtbl,
    pub get_status: unsafe extern "system" fn(*mut c_void, *mut Hresult) -> Hresult,
    pub get_result: unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> Hresult,
    pub get_error_buffer: unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> Hresult,
    pub has_output: unsafe extern "system" fn(*mut c_void, u32) -> i32,
    pub get_output: unsafe extern "system" fn(
        this: *mut c_void,
        kind: u32,
        riid: *const Guid,
        object: *mut *mut c_void,
        output_name: *mut *mut c_void,
    ) -> Hresult,
    pub get_num_outputs: unsafe extern "system" fn(*mut c_void) -> u32,
    pub get_output_by_index: unsafe extern "system" fn(*mut c_void, u32) -> u32,
    pub primary_output: unsafe extern "system" fn(*mut c_void) -> u32,
}

#[repr(C)]
pub(crate) struct IDxcBlobVtbl {
    pub unknown: IUnknownVtbl,
    pub get_buffer_pointer: unsafe extern "system" fn(*mut c_void) -> *mut c_void,
    pub get_buffer_size: unsafe extern "system" fn(*mut c_void) -> usize,
}

/// `IDxcBlobUtf8` including the inherited `IDxcBlobEncoding` slots.
#[repr(C)]
pub(crate) struct IDxcBlobUtf8Vtbl {
    pub unknown: IUnknownVtbl,
    pub get_buffer_pointer: unsafe extern "system" fn(*mut c_void) -> *mut c_void,
    pub get_buffer_size: unsafe extern "system" fn(*mut c_void) -> usize,
    pub get_encoding: unsafe extern "system" fn(*mut c_void, *mut i32, *mut u32) -> Hresult,
    pub get_string_pointer: unsafe extern "system" fn(*mut c_void) -> *const i8,
    pub get_string_length: unsafe extern "system" fn(*mut c_void) -> usize,
}

/// Every DXC vtable starts with the `IUnknown` slots.
pub(crate) trait ComVtbl {
    fn unknown_vtbl(&self) -> &IUnknownVtbl;
}

macro_rules! com_vtbl {
    ($($vtbl:ty),* $(,)?) => {
        $(impl ComVtbl for $vtbl {
            fn unknown_vtbl(&self) -> &IUnknownVtbl {
                &self.unknown
            }
        })*
    };
}

com_vtbl!(IDxcCompiler3Vtbl, IDxcResultVtbl, IDxcBlobVtbl, IDxcBlobUtf8Vtbl);

/// Owning wrapper around a COM interface pointer; releases on drop.
pub(crate) struct ComPtr<V: ComVtbl> {
    ptr: NonNull<c_void>,
    _vtbl: PhantomData<*const V>,
}

impl<V: ComVtbl> ComPtr<V> {
    /// Takes ownership of one reference. Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live COM object whose vtable layout
    /// matches `V`.
    pub(crate) unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| ComPtr {
            ptr,
            _vtbl: PhantomData,
        })
    }

    pub(crate) fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// # Safety
    ///
    /// Only sound under the same layout contract as [`ComPtr::from_raw`].
    pub(crate) unsafe fn vtbl(&self) -> &V {
        &**self.ptr.as_ptr().cast::<*const V>()
    }
}

impl<V: ComVtbl> Drop for ComPtr<V> {
    fn drop(&mut self) {
        unsafe {
            (self.vtbl().unknown_vtbl().release)(self.as_raw());
        }
    }
}
