// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

pub use s3pipe_aws_v4::{X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN};

// Request headers.
pub const AUTHORIZATION: &str = "authorization";
pub const HOST: &str = "host";
pub const X_AMZ_ACL: &str = "x-amz-acl";
pub const X_AMZ_GRANT_READ: &str = "x-amz-grant-read";
pub const X_AMZ_GRANT_WRITE: &str = "x-amz-grant-write";
pub const X_AMZ_GRANT_READ_ACP: &str = "x-amz-grant-read-acp";
pub const X_AMZ_GRANT_WRITE_ACP: &str = "x-amz-grant-write-acp";
pub const X_AMZ_GRANT_FULL_CONTROL: &str = "x-amz-grant-full-control";
pub const X_AMZ_STORAGE_CLASS: &str = "x-amz-storage-class";
pub const X_AMZ_TAGGING: &str = "x-amz-tagging";
pub const X_AMZ_WEBSITE_REDIRECT_LOCATION: &str = "x-amz-website-redirect-location";
pub const X_AMZ_META_PREFIX: &str = "x-amz-meta-";
pub const X_AMZ_MFA: &str = "x-amz-mfa";

// Copy headers.
pub const X_AMZ_COPY_SOURCE: &str = "x-amz-copy-source";
pub const X_AMZ_COPY_SOURCE_IF_MATCH: &str = "x-amz-copy-source-if-match";
pub const X_AMZ_COPY_SOURCE_IF_NONE_MATCH: &str = "x-amz-copy-source-if-none-match";
pub const X_AMZ_COPY_SOURCE_IF_MODIFIED_SINCE: &str = "x-amz-copy-source-if-modified-since";
pub const X_AMZ_COPY_SOURCE_IF_UNMODIFIED_SINCE: &str = "x-amz-copy-source-if-unmodified-since";
pub const X_AMZ_METADATA_DIRECTIVE: &str = "x-amz-metadata-directive";
pub const X_AMZ_TAGGING_DIRECTIVE: &str = "x-amz-tagging-directive";

// Response headers.
pub const ETAG: &str = "etag";
pub const X_AMZ_REQUEST_ID: &str = "x-amz-request-id";
pub const X_AMZ_ID_2: &str = "x-amz-id-2";
pub const X_AMZ_VERSION_ID: &str = "x-amz-version-id";
pub const X_AMZ_DELETE_MARKER: &str = "x-amz-delete-marker";
pub const X_AMZ_EXPIRATION: &str = "x-amz-expiration";
pub const X_AMZ_COPY_SOURCE_VERSION_ID: &str = "x-amz-copy-source-version-id";
pub const X_AMZ_ABORT_DATE: &str = "x-amz-abort-date";
pub const X_AMZ_ABORT_RULE_ID: &str = "x-amz-abort-rule-id";
pub const X_AMZ_SERVER_SIDE_ENCRYPTION: &str = "x-amz-server-side-encryption";

// Env values used by the s3 client.
pub const AWS_ENDPOINT_URL_S3: &str = "AWS_ENDPOINT_URL_S3";

/// Smallest part size the store accepts for every part but the last.
pub const MULTIPART_MIN_PART_SIZE: usize = 5 * 1024 * 1024;
/// Default number of part uploads allowed in flight.
pub const MULTIPART_DEFAULT_MAX_OUTSTANDING: usize = 20;

/// AsciiSet used to build object paths: every byte but the unreserved ones and '/'.
pub static S3_PATH_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// AsciiSet used to build query parameters.
pub static S3_QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
