use super::string_wrapper;

string_wrapper!(TenantId);
string_wrapper!(DeviceId);

// Resource types form an open set (cpu, memory, network, gpu, ...); the device
// registry decides which ones actually exist.
string_wrapper!(ResourceType);
