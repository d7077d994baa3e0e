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
use std::str::FromStr;

use futures::pin_mut;
use futures::stream::TryStreamExt;
use oscloud::resources::compute::{ComputeProxy, ServerFilter};
use oscloud::Query;

#[tokio::main]
async fn main() {
    env_logger::init();
    let limit = env::args()
        .nth(1)
        .map(|s| usize::from_str(&s).expect("Expected a number"));

    let session = oscloud::from_env()
        .await
        .expect("Failed to create a session from the environment");
    let compute = ComputeProxy::new(session);

    let mut query = Query::default();
    if let Some(limit) = limit {
        query.push(ServerFilter::Limit(limit));
    }

    let servers = compute.servers_stream(&query);
    pin_mut!(servers);
    while let Some(srv) = servers
        .try_next()
        .await
        .expect("Failed to fetch the next page")
    {
        println!("ID = {}, Name = {}", srv.id, srv.name);
    }
    println!("Done listing");
}
