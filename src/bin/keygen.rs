// Copyright (c) 2026 Veltaros
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Stand-alone identity generator: writes `<dir>/identity.key` and
//! `<dir>/identity.json` the same way the node does on first start, and
//! prints the address derived from the new public key.

use anyhow::Result;
use std::path::PathBuf;
use veltaros_node::core::address::address_from_pubkey;
use veltaros_node::core::identity::load_or_create;

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let dir = PathBuf::from(out_dir);
    std::fs::create_dir_all(&dir)?;

    let key_path = dir.join("identity.key");
    let record_path = dir.join("identity.json");

    if key_path.exists() {
        anyhow::bail!("{} already exists; refusing to overwrite an existing identity", key_path.display());
    }

    let identity = load_or_create(&key_path, &record_path)?;
    let address = address_from_pubkey(&identity.public_key);

    println!("address:    {address}");
    println!("public key: {}", hex::encode(identity.public_key));
    println!("key file:   {}", key_path.display());
    Ok(())
}
