use std::path::PathBuf;

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/fingervote/fingervote.toml")
}

pub fn system_socket_path() -> PathBuf {
    PathBuf::from("/run/fingervote/service.sock")
}

pub fn dev_config_file() -> PathBuf {
    PathBuf::from("configs/fingervote.toml")
}

pub fn dev_socket_path() -> PathBuf {
    PathBuf::from("/tmp/fingervote.sock")
}
