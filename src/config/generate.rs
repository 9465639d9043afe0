/// Commented starter config. Every value shown is the built-in default.
pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGBRIDGE CONFIGURATION
# =============================================================================
# Logbridge ships the monitor logs of locally installed products to a
# collector server and removes them once the collector is done with them.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logbridge/config.yml
#   3. /etc/logbridge/config.yml
#
# Values may reference environment variables as $env{NAME}.

# Where the agent keeps its server address, locale and per-product upload
# offsets. Defaults to <local data dir>/logbridge/settings.json.
# settings_path: ~/.local/share/logbridge/settings.json

# =============================================================================
# MONITORING
# =============================================================================

monitor:
  # Time between upload passes
  interval: 5s
  # Only files whose name contains the marker and carries the extension are
  # shipped, e.g. player[4821]_monitor.log
  file_marker: _monitor
  file_extension: log

# =============================================================================
# CONNECTION
# =============================================================================

connection:
  # How often a live connection is re-checked
  health_check_interval: 5s
  # How often a failed connection is retried
  retry_interval: 5s
  health_timeout: 2s
  request_timeout: 30s
  # Pause between a healthy check and the first upload pass
  settle_delay: 300ms

# =============================================================================
# PRODUCTS
# =============================================================================
# Products log under <local data dir>/MD-Series/<PRODUCT>/Log by default.
# Override a product's directories here; unlisted products keep the default.
#
# products:
#   MD_CLOUD:
#     - /opt/md/cloud/Log
#   MD_VIDEO:
#     - /opt/md/media/Log
#     - /opt/md/video/Log
"#
    .to_string()
}
