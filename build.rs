fn main() {
    // Embed the application icon and version info on Windows
    #[cfg(target_os = "windows")]
    {
        println!("cargo:rerun-if-changed=assets/monitor.ico");

        let mut res = winres::WindowsResource::new();
        res.set("FileDescription", "Livestream Monitor");
        res.set("ProductName", "Livestream Monitor");

        if std::path::Path::new("assets/monitor.ico").exists() {
            res.set_icon("assets/monitor.ico");
        }

        if let Err(e) = res.compile() {
            eprintln!("Warning: Failed to embed resources: {}", e);
        }
    }
}
