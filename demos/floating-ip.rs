// Copyright 2023 Dmitry Tantsur <dtantsur@protonmail.com>
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

use std::env;

use oscloud::cloud::DEFAULT_WAIT_TIMEOUT;
use oscloud::Cloud;

#[tokio::main]
async fn main() {
    env_logger::init();
    let server = env::args()
        .nth(1)
        .expect("Usage: floating-ip <server name or ID>");

    let cloud = Cloud::from_env()
        .await
        .expect("Failed to create a cloud from the environment");

    let server = cloud
        .get_server(&server)
        .await
        .expect("Failed to look up the server")
        .expect("Server not found");
    if let Some(ip) = server.public_v4.as_ref() {
        println!("Server {} already has public IP {}", server.name, ip);
        return;
    }

    let server = cloud
        .add_auto_ip(&server, true, DEFAULT_WAIT_TIMEOUT, true)
        .await
        .expect("Failed to attach a floating IP");
    println!(
        "Server {} is reachable at {:?}",
        server.name, server.interface_ip
    );
}
