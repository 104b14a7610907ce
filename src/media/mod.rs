pub mod embed;
pub mod extract;
pub mod fetch;
pub mod html;
pub mod payload;
pub mod store;

pub use embed::{
    apply_image_requests,
    TargetFieldPolicy,
};
pub use extract::{
    extract_data_urls,
    MediaLog,
    MediaLogKind,
};
pub use fetch::{
    fetch_image_as_base64,
    try_resize_to_jpeg,
};
pub use html::{
    auto_link_urls,
    build_img_tag,
    ensure_img_tag,
};
pub use payload::{
    ext_from_mime,
    sanitize_image_payload,
};
pub use store::{
    delete_media,
    get_media,
    store_media,
    DeletedMedia,
    MediaFile,
    StoredMedia,
};
