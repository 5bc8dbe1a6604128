//! Types generated at build time from the schemas under `schema/`.

pub mod generated {
    #![allow(clippy::all, dead_code, unused_imports, unused_mut)]

    include!(concat!(env!("OUT_DIR"), "/schemas.rs"));
}
