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

use oscloud::object_store::UploadOptions;
use oscloud::Cloud;

#[tokio::main]
async fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let (container, path) = match (args.next(), args.next()) {
        (Some(container), Some(path)) => (container, path),
        _ => panic!("Usage: upload-object <container> <file>"),
    };
    let name = args.next().unwrap_or_else(|| path.clone());

    let cloud = Cloud::from_env()
        .await
        .expect("Failed to create a cloud from the environment");

    if cloud
        .get_container(&container)
        .await
        .expect("Failed to get the container")
        .is_none()
    {
        let _ = cloud
            .create_container(&container, false)
            .await
            .expect("Failed to create the container");
    }

    let outcome = cloud
        .create_object(&container, &name, &path, &UploadOptions::default())
        .await
        .expect("Upload failed");
    println!("{}/{}: {:?}", container, name, outcome);
}
