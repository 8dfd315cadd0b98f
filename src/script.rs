//! The embedded provisioning script and the remote commands built around it
//!
//! The script takes no parameters; the upload command is the same string on
//! every run.

/// Remote path the script is written to before execution
pub const REMOTE_SCRIPT_PATH: &str = "/tmp/deploy.sh";

/// Heredoc delimiter for the upload; must never occur in the script
pub const HEREDOC_SENTINEL: &str = "VM_DEPLOY_SCRIPT_END_7f3a";

/// Home-relative checkout of the application on the VM
pub const APP_DIR: &str = "~/sistem-data-pasien";

/// Installs Docker and docker-compose, checks out the application and
/// starts its services. Runs under `set -e`; already-exists conditions from
/// repeated runs are tolerated with `|| true`.
pub const PROVISIONING_SCRIPT: &str = r#"#!/bin/bash
set -e

echo "========== Remote Deployment Started =========="
echo ""

# Update system
echo "[1/5] Updating system..."
sudo apt-get update -y > /dev/null 2>&1
sudo apt-get upgrade -y > /dev/null 2>&1

# Install Docker dependencies
echo "[2/5] Installing Docker..."
sudo apt-get install -y apt-transport-https ca-certificates curl gnupg lsb-release > /dev/null 2>&1

# Add Docker repository
curl -fsSL https://download.docker.com/linux/ubuntu/gpg | sudo gpg --batch --yes --dearmor -o /usr/share/keyrings/docker-archive-keyring.gpg 2>/dev/null
echo "deb [arch=amd64 signed-by=/usr/share/keyrings/docker-archive-keyring.gpg] https://download.docker.com/linux/ubuntu $(lsb_release -cs) stable" | sudo tee /etc/apt/sources.list.d/docker.list > /dev/null 2>&1

# Install Docker
sudo apt-get update -y > /dev/null 2>&1
sudo apt-get install -y docker-ce docker-ce-cli containerd.io > /dev/null 2>&1

# Install Docker Compose
echo "[3/5] Installing Docker Compose..."
sudo curl -L "https://github.com/docker/compose/releases/latest/download/docker-compose-$(uname -s)-$(uname -m)" -o /usr/local/bin/docker-compose 2>/dev/null
sudo chmod +x /usr/local/bin/docker-compose

# Setup Docker permissions
sudo usermod -aG docker $USER

echo "[4/5] Setting up project..."
mkdir -p ~/sistem-data-pasien
cd ~/sistem-data-pasien

# Clone or update project
echo "[5/5] Deploying application..."
if [ ! -d .git ]; then
    git clone --depth 1 https://github.com/WaffleWhip/sistem-data-pasien.git . 2>/dev/null || true
else
    git pull --ff-only 2>/dev/null || true
fi

# Start services (group membership only applies to new logins, so use sudo)
sudo docker compose up -d 2>/dev/null || true
sleep 5

echo ""
echo "========== Deployment Complete =========="
sudo docker compose ps
echo ""
"#;

/// Single command writing [`PROVISIONING_SCRIPT`] to [`REMOTE_SCRIPT_PATH`]
///
/// The sentinel is single-quoted so the remote shell performs no expansion
/// inside the body.
pub fn upload_command() -> String {
    format!(
        "cat > {} << '{}'\n{}{}",
        REMOTE_SCRIPT_PATH, HEREDOC_SENTINEL, PROVISIONING_SCRIPT, HEREDOC_SENTINEL
    )
}

/// Runs the uploaded script
pub fn run_command() -> String {
    format!("bash {}", REMOTE_SCRIPT_PATH)
}

/// Lists the application's containers
pub fn verify_command() -> String {
    format!("sudo docker compose -f {}/docker-compose.yml ps", APP_DIR)
}
