//! Endpoint paths and query parameter names.

/// `POST` a multipart body (field [`UPLOAD_FIELD`]) into directory [`PATH_PARAM`].
pub const UPLOAD: &str = "/upload";

/// `DELETE` a file or folder named by [`FILE_PARAM`].
pub const DELETE: &str = "/delete";

/// `GET`: starts archive creation for [`FOLDER_PARAM`], returns a job id.
pub const DOWNLOAD_ZIP: &str = "/download-zip";

/// `POST` a [`BulkZipRequest`](crate::BulkZipRequest) to archive several paths.
pub const BULK_DOWNLOAD_ZIP: &str = "/bulk-download-zip";

/// `GET`: current progress of [`JOB_ID_PARAM`].
pub const ZIP_PROGRESS: &str = "/zip-progress";

/// `GET`: the finished archive.
pub const DOWNLOAD_ZIP_FILE: &str = "/download-zip-file";

/// `POST`: best-effort cancellation of [`JOB_ID_PARAM`].
pub const CANCEL_ZIP: &str = "/cancel-zip";

pub const PATH_PARAM: &str = "path";
pub const FILE_PARAM: &str = "file";
pub const FOLDER_PARAM: &str = "folder";
pub const JOB_ID_PARAM: &str = "job_id";

/// Multipart field name carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";
