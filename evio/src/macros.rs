// SPDX-License-Identifier: MIT

/// Implements little-endian read helpers for primitive types on EvRead.
#[macro_export]
macro_rules! evio_impl_primitive_read {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<read_ $ty _at>](&mut self, offset: u64) -> EvIOResult<$ty> {
                    let mut buf = [0u8; core::mem::size_of::<$ty>()];
                    self.read_at(offset, &mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )+
    };
}

/// Implements little-endian write helpers for primitive types on EvIO.
#[macro_export]
macro_rules! evio_impl_primitive_write {
    ($($ty:ty),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<write_ $ty _at>](&mut self, offset: u64, value: $ty) -> EvIOResult {
                    let buf = value.to_le_bytes();
                    self.write_at(offset, &buf)
                }
            }
        )+
    };
}
