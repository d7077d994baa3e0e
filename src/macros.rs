// Copyright 2022 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Macros for protocol enumerations.

/// Define a protocol enumeration that (de-)serializes to a fixed set of values.
///
/// `Clone`, `Copy`, `Debug`, `Hash` and equality are derived; `Display`, `Serialize`,
/// `Deserialize` and a conversion into the carrier type are implemented.
///
/// With a string carrier:
///
/// ```rust
/// oscloud::protocol_enum! {
///     #[doc = "Direction of a security group rule."]
///     enum Direction {
///         Ingress = "ingress",
///         Egress = "egress"
///     }
/// }
///
/// assert_eq!(Direction::Egress.to_string(), "egress");
/// ```
///
/// With another carrier type:
///
/// ```rust
/// oscloud::protocol_enum! {
///     #[doc = "Nova power state."]
///     enum PowerState: u8 {
///         NoState = 0,
///         Running = 1,
///         Paused = 3,
///         Shutdown = 4
///     }
/// }
/// ```
///
/// Unknown values fail deserialization unless a catch-all variant is named after `=`:
///
/// ```rust
/// oscloud::protocol_enum! {
///     #[doc = "Volume status."]
///     #[non_exhaustive]
///     enum VolumeStatus = Unknown {
///         Available = "available",
///         InUse = "in-use",
///         Unknown = "unknown"
///     }
/// }
///
/// let status: VolumeStatus = serde_json::from_str("\"reserved\"").unwrap();
/// assert_eq!(status, VolumeStatus::Unknown);
/// ```
#[macro_export]
macro_rules! protocol_enum {
    {$(#[$attr:meta])* enum $name:ident: $carrier:ty {
        $($(#[$iattr:meta])* $item:ident = $val:expr),+
    }} => (
        $crate::protocol_enum! {
            $(#[$attr])*
            __common $name: $carrier {
                $($(#[$iattr])* $item = $val),+
            }
        }

        impl<'de> ::serde::de::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
                    where D: ::serde::de::Deserializer<'de> {
                let value: $carrier = ::serde::de::Deserialize::deserialize(deserializer)?;
                match value {
                    $($val => Ok($name::$item)),+,
                    other => Err(<D::Error as ::serde::de::Error>::custom(
                        format!("Unexpected {}: {}", stringify!($name), other)
                    )),
                }
            }
        }

        $crate::protocol_enum! { __serialize $name: $carrier }
    );

    {$(#[$attr:meta])* enum $name:ident: $carrier:ty = $default:ident {
        $($(#[$iattr:meta])* $item:ident = $val:expr),+
    }} => (
        $crate::protocol_enum! {
            $(#[$attr])*
            __common $name: $carrier {
                $($(#[$iattr])* $item = $val),+
            }
        }

        $crate::protocol_enum! { __default $name = $default }

        impl<'de> ::serde::de::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
                    where D: ::serde::de::Deserializer<'de> {
                let value: $carrier = ::serde::de::Deserialize::deserialize(deserializer)?;
                Ok(match value {
                    $($val => $name::$item),+,
                    _ => $name::$default,
                })
            }
        }

        $crate::protocol_enum! { __serialize $name: $carrier }
    );

    {$(#[$attr:meta])* enum $name:ident {
        $($(#[$iattr:meta])* $item:ident = $val:expr),+
    }} => (
        $crate::protocol_enum! {
            $(#[$attr])*
            __common $name: String {
                $($(#[$iattr])* $item = $val),+
            }
        }

        impl $name {
            /// The protocol value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$item => $val),+,
                }
            }
        }

        impl<'de> ::serde::de::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
                    where D: ::serde::de::Deserializer<'de> {
                match <String as ::serde::de::Deserialize>::deserialize(deserializer)?.as_str() {
                    $($val => Ok($name::$item)),+,
                    other => Err(<D::Error as ::serde::de::Error>::custom(
                        format!("Unexpected {}: {}", stringify!($name), other)
                    )),
                }
            }
        }

        impl ::serde::ser::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
                    where S: ::serde::ser::Serializer {
                serializer.serialize_str(self.as_str())
            }
        }
    );

    {$(#[$attr:meta])* enum $name:ident = $default:ident {
        $($(#[$iattr:meta])* $item:ident = $val:expr),+
    }} => (
        $crate::protocol_enum! {
            $(#[$attr])*
            __common $name: String {
                $($(#[$iattr])* $item = $val),+
            }
        }

        $crate::protocol_enum! { __default $name = $default }

        impl $name {
            /// The protocol value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$item => $val),+,
                }
            }
        }

        impl<'de> ::serde::de::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
                    where D: ::serde::de::Deserializer<'de> {
                Ok(match <String as ::serde::de::Deserialize>::deserialize(deserializer)?.as_str() {
                    $($val => $name::$item),+,
                    _ => $name::$default,
                })
            }
        }

        impl ::serde::ser::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
                    where S: ::serde::ser::Serializer {
                serializer.serialize_str(self.as_str())
            }
        }
    );

    {__default $name:ident = $default:ident} => (
        impl Default for $name {
            fn default() -> $name {
                $name::$default
            }
        }
    );

    {__serialize $name:ident: $carrier:ty} => (
        impl ::serde::ser::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
                    where S: ::serde::ser::Serializer {
                ::serde::ser::Serialize::serialize(&<$carrier>::from(*self), serializer)
            }
        }
    );

    {$(#[$attr:meta])* __common $name:ident: $carrier:ty {
        $($(#[$iattr:meta])* $item:ident = $val:expr),+
    }} => (
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$iattr])* $item),+,
        }

        impl From<$name> for $carrier {
            fn from(value: $name) -> $carrier {
                match value {
                    $($name::$item => $val.into()),+,
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&<$carrier>::from(*self), f)
            }
        }
    );
}
