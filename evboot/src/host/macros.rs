// SPDX-License-Identifier: MIT

/// `args!["tool", "-x", path.display()]` → `Vec<String>`
#[macro_export]
macro_rules! args {
    ( $( $x:expr ),* $(,)? ) => {
        vec![ $( $x.to_string() ),* ]
    };
}
